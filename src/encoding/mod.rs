use std::path::Path;
use tracing::debug;

use crate::hdr::HdrMetadata;
use crate::probe::translate::{self, PixelFormat};
use crate::probe::{ProbeResult, StreamDescriptor};
use crate::utils::{Error, Result};

const INTERLACED_FIELD_ORDERS: &[&str] = &["tt", "bb", "tb", "bt"];

/// User-facing knobs for the video encode.
#[derive(Debug, Clone)]
pub struct VideoEncodeOptions {
    pub crf: f32,
    pub preset: String,
    /// Keep the source bit depth instead of promoting 8-bit to 10-bit output.
    pub keep_depth: bool,
    /// Deinterlace to one frame per field, doubling the frame rate.
    pub double_rate: bool,
    pub extra_params: Vec<String>,
}

impl Default for VideoEncodeOptions {
    fn default() -> Self {
        Self {
            crf: 18.0,
            preset: "slow".to_string(),
            keep_depth: false,
            double_rate: false,
            extra_params: Vec::new(),
        }
    }
}

/// Fully derived invocation plan for the decode→encode process pair.
///
/// The argument vectors are built once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct VideoEncodePlan {
    pub decoder_args: Vec<String>,
    pub encoder_args: Vec<String>,
    pub fps: f64,
    pub total_frames: u64,
}

/// Translates probe metadata into the decoder and encoder argument sets.
pub fn build_video_plan(
    probed: &ProbeResult,
    hdr: &HdrMetadata,
    options: &VideoEncodeOptions,
    input: &Path,
    output: &Path,
) -> Result<VideoEncodePlan> {
    let stream = probed.video_stream()?;

    let pix_fmt = stream
        .pix_fmt
        .as_deref()
        .ok_or_else(|| Error::validation("video stream reports no pixel format"))?;
    let format = translate::parse_pixel_format(pix_fmt)?;

    let rate = stream.avg_frame_rate.as_deref().unwrap_or("");
    let mut fps = translate::parse_rational(rate);
    if !fps.is_finite() || fps <= 0.0 {
        return Err(Error::validation(format!("invalid frame rate: {}", rate)));
    }

    let mut deinterlace_filter = None;
    if stream
        .field_order
        .as_deref()
        .is_some_and(|order| INTERLACED_FIELD_ORDERS.contains(&order))
    {
        if options.double_rate {
            deinterlace_filter = Some("bwdif=mode=send_field");
            fps *= 2.0;
        } else {
            deinterlace_filter = Some("bwdif=mode=send_frame");
        }
    }

    let duration = translate::resolve_duration(stream, &probed.format);
    let total_frames = if duration.is_nan() {
        0
    } else {
        (duration * fps).round() as u64
    };

    debug!(
        "Video plan: csp={} depth={} fps={:.3} total_frames={} deinterlace={:?}",
        format.csp, format.depth, fps, total_frames, deinterlace_filter
    );

    Ok(VideoEncodePlan {
        decoder_args: build_decoder_args(input, deinterlace_filter),
        encoder_args: build_encoder_args(&format, stream, hdr, options, total_frames, output),
        fps,
        total_frames,
    })
}

fn build_decoder_args(input: &Path, deinterlace_filter: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.display().to_string(),
        "-map".into(),
        "0:v:0".into(),
    ];
    if let Some(filter) = deinterlace_filter {
        args.push("-vf".into());
        args.push(filter.into());
    }
    args.extend([
        "-f".into(),
        "yuv4mpegpipe".into(),
        "-strict".into(),
        "-1".into(),
        "-".into(),
    ]);
    args
}

fn build_encoder_args(
    format: &PixelFormat,
    stream: &StreamDescriptor,
    hdr: &HdrMetadata,
    options: &VideoEncodeOptions,
    total_frames: u64,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["--y4m".into()];

    args.extend(["--input-depth".into(), format.depth.clone()]);
    if format.depth == "8" && !options.keep_depth {
        // 8-bit sources are promoted to a 10-bit output by default; the
        // extra precision avoids banding at no real size cost.
        args.extend(["--output-depth".into(), "10".into()]);
    } else {
        args.extend(["--output-depth".into(), format.depth.clone()]);
        if format.depth == "8" {
            // Staying at 8 bits needs adaptive quantization bias to keep
            // gradients from banding.
            args.extend(["--aq-mode".into(), "3".into()]);
        }
    }
    args.extend(["--input-csp".into(), format.csp.clone()]);

    if let Some(range) = stream.color_range.as_deref() {
        let range = match range {
            "tv" | "mpeg" => "limited",
            "pc" | "jpeg" => "full",
            other => other,
        };
        args.extend(["--range".into(), range.into()]);
    }
    if let Some(primaries) = &stream.color_primaries {
        args.extend(["--colorprim".into(), primaries.clone()]);
    }
    if let Some(transfer) = &stream.color_transfer {
        args.extend(["--transfer".into(), transfer.clone()]);
    }
    if let Some(matrix) = &stream.color_space {
        args.extend(["--colormatrix".into(), matrix.clone()]);
    }

    if let Some(master_display) = &hdr.master_display {
        args.extend([
            "--master-display".into(),
            master_display.clone(),
            "--hdr10".into(),
            "--repeat-headers".into(),
        ]);
    }
    if let Some(cll) = &hdr.content_light {
        args.extend([
            "--max-cll".into(),
            format!("{},{}", cll.max_cll, cll.max_fall),
        ]);
    }

    args.extend([
        "--crf".into(),
        options.crf.to_string(),
        "--preset".into(),
        options.preset.clone(),
    ]);
    args.extend(options.extra_params.iter().cloned());

    if total_frames > 0 {
        args.extend(["--frames".into(), total_frames.to_string()]);
    }

    args.push("-".into());
    args.extend(["--output".into(), output.display().to_string()]);
    args
}
