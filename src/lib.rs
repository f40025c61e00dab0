pub mod cli;
pub mod config;
pub mod encoding;
pub mod hdr;
pub mod job;
pub mod pipeline;
pub mod probe;
pub mod remux;
pub mod utils;

pub use config::ToolPaths;
pub use encoding::{VideoEncodeOptions, VideoEncodePlan};
pub use hdr::HdrMetadata;
pub use job::{JobOptions, JobPaths, TranscodeJob};
pub use probe::{ProbeResult, StreamDescriptor};
pub use remux::TrackTagSet;
pub use utils::{Error, Result};
