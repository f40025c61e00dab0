use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ToolPaths;
use crate::pipeline;
use crate::probe::StreamDescriptor;
use crate::utils::{Error, Result};

static MUX_PROGRESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Pp]rogress:\s*(\d+)%").unwrap());

/// Per-track metadata written into the final container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTagSet {
    pub language: Option<String>,
    pub default: bool,
    pub forced: bool,
    pub hearing_impaired: bool,
    pub visual_impaired: bool,
    pub text_descriptions: bool,
    pub original: bool,
    pub commentary: bool,
}

impl TrackTagSet {
    /// Copies language and disposition flags from a probed stream.
    pub fn from_stream(stream: &StreamDescriptor) -> Self {
        Self {
            language: stream.tags.get("language").cloned(),
            default: stream.disposition.default != 0,
            forced: stream.disposition.forced != 0,
            hearing_impaired: stream.disposition.hearing_impaired != 0,
            visual_impaired: stream.disposition.visual_impaired != 0,
            text_descriptions: stream.disposition.descriptions != 0,
            original: stream.disposition.original != 0,
            commentary: stream.disposition.comment != 0,
        }
    }

    /// mkvmerge per-file options for a single-track input file.
    fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(language) = &self.language {
            args.push("--language".to_string());
            args.push(format!("0:{}", language));
        }
        let flags = [
            ("--default-track-flag", self.default),
            ("--forced-display-flag", self.forced),
            ("--hearing-impaired-flag", self.hearing_impaired),
            ("--visual-impaired-flag", self.visual_impaired),
            ("--text-descriptions-flag", self.text_descriptions),
            ("--original-flag", self.original),
            ("--commentary-flag", self.commentary),
        ];
        for (flag, value) in flags {
            args.push(flag.to_string());
            args.push(format!("0:{}", if value { "yes" } else { "no" }));
        }
        args
    }
}

#[derive(Debug)]
pub struct RemuxPlan {
    pub video: PathBuf,
    pub video_tags: TrackTagSet,
    /// Transcoded audio sidecars in source track order; empty when the
    /// original audio is carried over from the source file.
    pub audio: Vec<(PathBuf, TrackTagSet)>,
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Builds the complete mkvmerge argument list for one job.
///
/// The source file always contributes everything except video; when audio
/// was transcoded its original audio tracks are dropped too.
pub fn build_remux_args(plan: &RemuxPlan) -> Vec<String> {
    let mut args = vec!["-o".to_string(), plan.output.display().to_string()];

    args.extend(plan.video_tags.to_args());
    args.push(plan.video.display().to_string());

    for (path, tags) in &plan.audio {
        args.extend(tags.to_args());
        args.push(path.display().to_string());
    }

    args.push("-D".to_string());
    if !plan.audio.is_empty() {
        args.push("--no-audio".to_string());
    }
    args.push(plan.source.display().to_string());

    args
}

/// Runs mkvmerge, surfacing its percentage output as a live progress bar.
pub async fn remux(tools: &ToolPaths, plan: &RemuxPlan) -> Result<()> {
    let args = build_remux_args(plan);
    info!("Remuxing into {}", plan.output.display());
    debug!("mkvmerge arguments: {}", args.join(" "));

    let mut child = Command::new(&tools.mkvmerge)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("mkvmerge stdout was not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("mkvmerge stderr was not captured")))?;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("remux:  [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap()
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );

    // Both pipes must be drained concurrently; a tool that fills one while
    // this side only reads the other would block on a full pipe buffer.
    let scan_stdout = async {
        let mut captured = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(captures) = MUX_PROGRESS_REGEX.captures(&line) {
                if let Ok(percent) = captures[1].parse::<u64>() {
                    bar.set_position(percent.min(100));
                }
            } else if !line.trim().is_empty() {
                captured.push(line);
            }
        }
        Ok::<_, std::io::Error>(captured)
    };
    let (captured, stderr_tail) = tokio::join!(scan_stdout, pipeline::pump_stderr(stderr, None));
    let captured = captured?;
    let stderr_tail = stderr_tail?;

    let status = child.wait().await?;
    if !status.success() {
        bar.abandon();
        let detail = if stderr_tail.trim().is_empty() {
            captured.join("\n")
        } else {
            stderr_tail.trim().to_string()
        };
        return Err(Error::remux(format!(
            "mkvmerge exited with {}: {}",
            status, detail
        )));
    }

    bar.finish();
    Ok(())
}
