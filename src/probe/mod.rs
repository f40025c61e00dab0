use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolPaths;
use crate::utils::{Error, Result};

pub mod translate;

/// Parsed ffprobe output for one media file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProbeResult {
    pub streams: Vec<StreamDescriptor>,
    pub frames: Vec<FrameDescriptor>,
    pub format: FormatMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatMetadata {
    pub duration: Option<String>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamDescriptor {
    pub index: u32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub pix_fmt: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub field_order: Option<String>,
    pub color_range: Option<String>,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
    pub duration: Option<String>,
    pub disposition: Disposition,
    pub tags: HashMap<String, String>,
    pub side_data_list: Vec<SideDataRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Disposition {
    pub default: u8,
    pub forced: u8,
    pub hearing_impaired: u8,
    pub visual_impaired: u8,
    pub descriptions: u8,
    pub original: u8,
    pub comment: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrameDescriptor {
    pub side_data_list: Vec<SideDataRecord>,
}

/// One typed metadata blob attached to a stream or frame.
///
/// The mastering display fields arrive as rational strings ("35400/50000"),
/// the content light levels as plain integers. Which fields are populated
/// depends on `side_data_type`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SideDataRecord {
    pub side_data_type: Option<String>,
    pub red_x: Option<String>,
    pub red_y: Option<String>,
    pub green_x: Option<String>,
    pub green_y: Option<String>,
    pub blue_x: Option<String>,
    pub blue_y: Option<String>,
    pub white_point_x: Option<String>,
    pub white_point_y: Option<String>,
    pub max_luminance: Option<String>,
    pub min_luminance: Option<String>,
    pub max_content: Option<u32>,
    pub max_average: Option<u32>,
}

impl ProbeResult {
    /// First video stream. A file without one is not a valid job input.
    pub fn video_stream(&self) -> Result<&StreamDescriptor> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| Error::validation("input has no video stream"))
    }

    /// First decodable frame. Required so frame-level side data can be read.
    pub fn first_frame(&self) -> Result<&FrameDescriptor> {
        self.frames
            .first()
            .ok_or_else(|| Error::validation("input has no decodable frames"))
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
    }
}

/// Runs ffprobe once against `input`, requesting format, stream, and frame
/// data restricted to the earliest readable interval.
pub async fn probe<P: AsRef<Path>>(tools: &ToolPaths, input: P) -> Result<ProbeResult> {
    let input = input.as_ref();
    debug!("Probing {}", input.display());

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-show_frames",
            "-read_intervals",
            "%+#1",
        ])
        .arg(input)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::probe(format!("unparsable ffprobe output: {}", e)))
}
