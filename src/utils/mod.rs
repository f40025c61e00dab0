pub mod error;
pub mod filesystem;
pub mod logging;

pub use error::{Error, Result};
pub use filesystem::{remove_artifact, temp_artifact_path};
pub use logging::setup_logging;
