use clap::Parser;
use std::path::PathBuf;

use crate::encoding::VideoEncodeOptions;
use crate::job::JobOptions;
use crate::utils::{Error, Result};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(name = "hevc-transcode")]
#[command(about = "x265/HEVC transcode pipeline with Dolby Vision and HDR10+ passthrough")]
#[command(long_about = "
Probes a source video, derives x265 parameters from its pixel format, color
metadata, and HDR side data, runs the ffmpeg|x265 decode/encode pair,
reinjects Dolby Vision RPU and HDR10+ metadata into the encoded stream, and
remuxes everything with mkvmerge while preserving track languages and
disposition flags.

Tool locations default to the bare names on $PATH and can be overridden via
FFMPEG_PATH, FFPROBE_PATH, X265_PATH, DOVI_TOOL_PATH, HDR10PLUS_TOOL_PATH,
MKVMERGE_PATH, and OPUSENC_PATH.

EXAMPLES:
  # Straight video re-encode, audio copied as-is
  hevc-transcode -i input.mkv -o output.mkv

  # Slower preset with audio re-encoded to Opus
  hevc-transcode -i input.mkv -o output.mkv --preset veryslow --transcode-audio

  # Interlaced source, deinterlaced to one frame per field
  hevc-transcode -i capture.mkv -o output.mkv --double-rate
")]
pub struct CliArgs {
    /// Input video file
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output container path
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Constant rate factor passed to x265
    #[arg(long, default_value_t = 18.0)]
    pub crf: f32,

    /// x265 preset
    #[arg(long, default_value = "slow")]
    pub preset: String,

    /// Keep the source bit depth instead of promoting 8-bit sources to
    /// 10-bit output
    #[arg(long)]
    pub keep_depth: bool,

    /// Deinterlace at double rate (one frame per field)
    #[arg(long)]
    pub double_rate: bool,

    /// Re-encode audio tracks to Opus instead of copying them
    #[arg(long)]
    pub transcode_audio: bool,

    /// Opus bitrate in kbit/s for transcoded audio tracks
    #[arg(long, default_value = "160", value_name = "KBPS")]
    pub audio_bitrate: String,

    /// Extra token appended to the x265 argument set (repeatable)
    #[arg(long = "x265-arg", value_name = "TOKEN", action = clap::ArgAction::Append)]
    pub x265_args: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CliArgs {
    pub fn validate(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(Error::validation(format!(
                "input file not found: {}",
                self.input.display()
            )));
        }
        if !(0.0..=51.0).contains(&self.crf) {
            return Err(Error::validation(format!(
                "crf out of range 0-51: {}",
                self.crf
            )));
        }
        self.audio_bitrate_kbps()?;
        Ok(())
    }

    pub fn audio_bitrate_kbps(&self) -> Result<u32> {
        self.audio_bitrate.parse().map_err(|_| {
            Error::validation(format!("invalid audio bitrate: {}", self.audio_bitrate))
        })
    }

    pub fn job_options(&self) -> Result<JobOptions> {
        Ok(JobOptions {
            video: VideoEncodeOptions {
                crf: self.crf,
                preset: self.preset.clone(),
                keep_depth: self.keep_depth,
                double_rate: self.double_rate,
                extra_params: self.x265_args.clone(),
            },
            transcode_audio: self.transcode_audio,
            audio_bitrate_kbps: self.audio_bitrate_kbps()?,
        })
    }
}
