use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ToolPaths;
use crate::encoding::{self, VideoEncodeOptions, VideoEncodePlan};
use crate::hdr::{self, sidecar, HdrMetadata};
use crate::pipeline::progress::{AudioProgress, EncodeProgress};
use crate::pipeline::{self, StderrSource};
use crate::probe::{self, translate, FormatMetadata, ProbeResult, StreamDescriptor};
use crate::remux::{self, RemuxPlan, TrackTagSet};
use crate::utils::{remove_artifact, temp_artifact_path, Error, Result};

#[derive(Debug, Clone)]
pub struct JobOptions {
    pub video: VideoEncodeOptions,
    pub transcode_audio: bool,
    pub audio_bitrate_kbps: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            video: VideoEncodeOptions::default(),
            transcode_audio: false,
            audio_bitrate_kbps: 160,
        }
    }
}

/// Filesystem locations for one job.
///
/// `video_temp` tracks the current elementary-stream artifact and is
/// reassigned after each injection stage. Paths still set when a job fails
/// point at leaked temp files; callers needing guaranteed cleanup must wrap
/// the whole job themselves.
#[derive(Debug, Clone, Default)]
pub struct JobPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub video_temp: Option<PathBuf>,
    pub rpu_sidecar: Option<PathBuf>,
    pub hdr10plus_sidecar: Option<PathBuf>,
    pub audio_temps: Vec<PathBuf>,
}

/// Drives one transcode job through its linear stage sequence:
/// probe → build-video-args → extract-hdr → transcode-video → inject-hdr →
/// [transcode-audio]* → remux → cleanup. The first failing stage aborts the
/// job; later stages (including cleanup) never run.
pub struct TranscodeJob {
    tools: ToolPaths,
    options: JobOptions,
    paths: JobPaths,
    work_dir: PathBuf,
}

impl TranscodeJob {
    pub fn new(tools: ToolPaths, options: JobOptions, input: PathBuf, output: PathBuf) -> Self {
        let work_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            tools,
            options,
            paths: JobPaths {
                input,
                output,
                ..JobPaths::default()
            },
            work_dir,
        }
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Starting job: {}", self.paths.input.display());

        let probed = probe::probe(&self.tools, &self.paths.input).await?;
        let video_stream = probed.video_stream()?;
        probed.first_frame()?;
        let hdr_metadata = hdr::scan_side_data(video_stream, probed.frames.first())?;

        if hdr_metadata.is_hdr10() {
            info!("Source carries HDR10 static metadata");
        }

        let video_temp = temp_artifact_path(&self.work_dir, "hevc");
        let plan = encoding::build_video_plan(
            &probed,
            &hdr_metadata,
            &self.options.video,
            &self.paths.input,
            &video_temp,
        )?;

        self.extract_hdr(&hdr_metadata).await?;
        self.transcode_video(&plan, video_temp).await?;
        self.inject_hdr().await?;

        let audio_tracks = if self.options.transcode_audio {
            self.transcode_audio_tracks(&probed).await?
        } else {
            Vec::new()
        };

        let video_tags = TrackTagSet::from_stream(probed.video_stream()?);
        self.remux(video_tags, audio_tracks).await?;
        self.cleanup().await?;

        info!("Job finished: {}", self.paths.output.display());
        Ok(())
    }

    async fn extract_hdr(&mut self, hdr_metadata: &HdrMetadata) -> Result<()> {
        if hdr_metadata.dolby_vision {
            let sidecar_path = temp_artifact_path(&self.work_dir, "bin");
            sidecar::extract_rpu(&self.tools, &self.paths.input, &sidecar_path).await?;
            self.paths.rpu_sidecar = Some(sidecar_path);
        }
        if hdr_metadata.hdr10plus {
            let sidecar_path = temp_artifact_path(&self.work_dir, "json");
            sidecar::extract_hdr10plus(&self.tools, &self.paths.input, &sidecar_path).await?;
            self.paths.hdr10plus_sidecar = Some(sidecar_path);
        }
        Ok(())
    }

    async fn transcode_video(&mut self, plan: &VideoEncodePlan, video_temp: PathBuf) -> Result<()> {
        info!(
            "Encoding video to {} ({} frames expected)",
            video_temp.display(),
            plan.total_frames
        );
        debug!("Decoder arguments: {}", plan.decoder_args.join(" "));
        debug!("Encoder arguments: {}", plan.encoder_args.join(" "));

        let mut producer = Command::new(&self.tools.ffmpeg);
        producer.args(&plan.decoder_args);
        let mut consumer = Command::new(&self.tools.x265);
        consumer.args(&plan.encoder_args);

        let bar = encode_progress_bar(plan.total_frames);
        let mut progress = EncodeProgress::new(plan.total_frames);

        let outcome = pipeline::run_pair(producer, consumer, StderrSource::Consumer, |line| {
            if let Some(snapshot) = progress.observe(line) {
                bar.set_position(snapshot.done_frames);
                bar.set_message(format!(
                    "{:.1} fps, {:.0} kb/s, eta {}",
                    snapshot.smoothed_fps, snapshot.bitrate_kbps, snapshot.eta
                ));
            }
        })
        .await?;

        if !outcome.consumer_status.success() {
            bar.abandon();
            return Err(Error::transcode(format!(
                "x265 exited with {}: {}",
                outcome.consumer_status, outcome.consumer_stderr
            )));
        }
        if !outcome.producer_status.success() {
            bar.abandon();
            return Err(Error::transcode(format!(
                "ffmpeg exited with {}: {}",
                outcome.producer_status, outcome.producer_stderr
            )));
        }

        bar.finish_with_message("done");
        self.paths.video_temp = Some(video_temp);
        Ok(())
    }

    /// Dolby Vision first, HDR10+ second when both sidecars exist. Each
    /// successful injection retires the consumed artifacts and advances the
    /// current elementary-stream pointer.
    async fn inject_hdr(&mut self) -> Result<()> {
        if let Some(sidecar_path) = self.paths.rpu_sidecar.clone() {
            let current = self.current_video()?;
            let next = temp_artifact_path(&self.work_dir, "hevc");
            sidecar::inject_rpu(&self.tools, &current, &sidecar_path, &next).await?;
            remove_artifact(&current).await?;
            remove_artifact(&sidecar_path).await?;
            self.paths.rpu_sidecar = None;
            self.paths.video_temp = Some(next);
        }

        if let Some(sidecar_path) = self.paths.hdr10plus_sidecar.clone() {
            let current = self.current_video()?;
            let next = temp_artifact_path(&self.work_dir, "hevc");
            sidecar::inject_hdr10plus(&self.tools, &current, &sidecar_path, &next).await?;
            remove_artifact(&current).await?;
            remove_artifact(&sidecar_path).await?;
            self.paths.hdr10plus_sidecar = None;
            self.paths.video_temp = Some(next);
        }

        Ok(())
    }

    async fn transcode_audio_tracks(
        &mut self,
        probed: &ProbeResult,
    ) -> Result<Vec<(PathBuf, TrackTagSet)>> {
        let audio_streams: Vec<&StreamDescriptor> = probed.audio_streams().collect();
        let mut tracks = Vec::with_capacity(audio_streams.len());

        for (track, stream) in audio_streams.iter().enumerate() {
            let tags = TrackTagSet::from_stream(stream);
            let path = self
                .transcode_audio_track(track, stream, &probed.format)
                .await?;
            self.paths.audio_temps.push(path.clone());
            tracks.push((path, tags));
        }

        Ok(tracks)
    }

    async fn transcode_audio_track(
        &self,
        track: usize,
        stream: &StreamDescriptor,
        format: &FormatMetadata,
    ) -> Result<PathBuf> {
        let output = temp_artifact_path(&self.work_dir, "opus");
        info!("Transcoding audio track {} to {}", track, output.display());

        let mut producer = Command::new(&self.tools.ffmpeg);
        producer
            .args(["-hide_banner", "-i"])
            .arg(&self.paths.input)
            .args(["-map", &format!("0:a:{}", track), "-f", "wav", "-"]);

        let mut consumer = Command::new(&self.tools.opusenc);
        consumer
            .args([
                "--quiet",
                "--bitrate",
                &self.options.audio_bitrate_kbps.to_string(),
                "-",
            ])
            .arg(&output);

        let duration = translate::resolve_duration(stream, format);
        let progress = AudioProgress::new(if duration.is_nan() { 0.0 } else { duration });

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "audio {}: [{{bar:40.cyan/blue}}] {{pos:>3}}% {{msg}}",
                    track
                ))
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );

        let outcome = pipeline::run_pair(producer, consumer, StderrSource::Producer, |line| {
            if let Some(snapshot) = progress.observe(line) {
                bar.set_position(snapshot.percent.round() as u64);
                let mut parts = Vec::new();
                if let Some(bitrate) = snapshot.bitrate_kbps {
                    parts.push(format!("{:.0} kb/s", bitrate));
                }
                if let Some(speed) = snapshot.speed {
                    parts.push(format!("{:.1}x", speed));
                }
                bar.set_message(parts.join(" "));
            }
        })
        .await?;

        if !outcome.consumer_status.success() {
            bar.abandon();
            return Err(Error::transcode(format!(
                "opusenc exited with {}: {}",
                outcome.consumer_status, outcome.consumer_stderr
            )));
        }
        if !outcome.producer_status.success() {
            bar.abandon();
            return Err(Error::transcode(format!(
                "ffmpeg exited with {}: {}",
                outcome.producer_status, outcome.producer_stderr
            )));
        }

        bar.finish();
        Ok(output)
    }

    async fn remux(
        &mut self,
        video_tags: TrackTagSet,
        audio: Vec<(PathBuf, TrackTagSet)>,
    ) -> Result<()> {
        let plan = RemuxPlan {
            video: self.current_video()?,
            video_tags,
            audio,
            source: self.paths.input.clone(),
            output: self.paths.output.clone(),
        };
        remux::remux(&self.tools, &plan).await
    }

    /// Runs only after a successful remux; a failed job leaves its temp
    /// artifacts behind.
    async fn cleanup(&mut self) -> Result<()> {
        if let Some(path) = self.paths.video_temp.take() {
            remove_artifact(&path).await?;
        }
        for path in std::mem::take(&mut self.paths.audio_temps) {
            remove_artifact(&path).await?;
        }
        Ok(())
    }

    fn current_video(&self) -> Result<PathBuf> {
        self.paths
            .video_temp
            .clone()
            .ok_or_else(|| Error::transcode("no encoded video artifact to operate on"))
    }
}

fn encode_progress_bar(total_frames: u64) -> ProgressBar {
    if total_frames == 0 {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("encode: {msg}")
                .unwrap(),
        );
        bar
    } else {
        let bar = ProgressBar::new(total_frames);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("encode: [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        bar
    }
}
