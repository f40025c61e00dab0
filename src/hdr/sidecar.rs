use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ToolPaths;
use crate::pipeline::{self, StderrSource};
use crate::utils::{Error, Result};

/// ffmpeg invocation that dumps the source's video elementary stream
/// losslessly as annex-B HEVC on stdout, ready to pipe into a side tool.
fn bitstream_dump_command(tools: &ToolPaths, input: &Path) -> Command {
    let mut cmd = Command::new(&tools.ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(input)
        .args([
            "-map",
            "0:v:0",
            "-c:v",
            "copy",
            "-bsf:v",
            "hevc_mp4toannexb",
            "-f",
            "hevc",
            "-",
        ]);
    cmd
}

/// Extracts the Dolby Vision RPU from the source into a sidecar binary.
pub async fn extract_rpu(tools: &ToolPaths, input: &Path, sidecar: &Path) -> Result<()> {
    info!("Extracting Dolby Vision RPU to {}", sidecar.display());

    let producer = bitstream_dump_command(tools, input);
    let mut consumer = Command::new(&tools.dovi_tool);
    consumer.args(["extract-rpu", "-", "-o"]).arg(sidecar);

    run_extraction(producer, consumer).await
}

/// Extracts HDR10+ dynamic metadata from the source into a sidecar JSON file.
pub async fn extract_hdr10plus(tools: &ToolPaths, input: &Path, sidecar: &Path) -> Result<()> {
    info!("Extracting HDR10+ metadata to {}", sidecar.display());

    let producer = bitstream_dump_command(tools, input);
    let mut consumer = Command::new(&tools.hdr10plus_tool);
    consumer.args(["extract", "-", "-o"]).arg(sidecar);

    run_extraction(producer, consumer).await
}

async fn run_extraction(producer: Command, consumer: Command) -> Result<()> {
    let outcome = pipeline::run_pair(producer, consumer, StderrSource::Consumer, |_| {}).await?;

    if !outcome.consumer_status.success() {
        return Err(Error::HdrExtract {
            code: outcome.consumer_status.code().unwrap_or(-1),
            stderr: outcome.consumer_stderr,
        });
    }
    if !outcome.producer_status.success() {
        return Err(Error::HdrExtract {
            code: outcome.producer_status.code().unwrap_or(-1),
            stderr: outcome.producer_stderr,
        });
    }

    Ok(())
}

/// Injects an RPU sidecar into an encoded elementary stream, writing a new
/// stream artifact.
pub async fn inject_rpu(
    tools: &ToolPaths,
    video_in: &Path,
    sidecar: &Path,
    video_out: &Path,
) -> Result<()> {
    info!(
        "Injecting Dolby Vision RPU: {} + {} -> {}",
        video_in.display(),
        sidecar.display(),
        video_out.display()
    );

    let mut cmd = Command::new(&tools.dovi_tool);
    cmd.args(["inject-rpu", "-i"])
        .arg(video_in)
        .arg("--rpu-in")
        .arg(sidecar)
        .arg("-o")
        .arg(video_out);

    run_injection(cmd).await
}

/// Injects an HDR10+ metadata sidecar into an encoded elementary stream.
pub async fn inject_hdr10plus(
    tools: &ToolPaths,
    video_in: &Path,
    sidecar: &Path,
    video_out: &Path,
) -> Result<()> {
    info!(
        "Injecting HDR10+ metadata: {} + {} -> {}",
        video_in.display(),
        sidecar.display(),
        video_out.display()
    );

    let mut cmd = Command::new(&tools.hdr10plus_tool);
    cmd.args(["inject", "-i"])
        .arg(video_in)
        .arg("-j")
        .arg(sidecar)
        .arg("-o")
        .arg(video_out);

    run_injection(cmd).await
}

async fn run_injection(mut cmd: Command) -> Result<()> {
    let output = cmd.output().await?;

    if !output.status.success() {
        return Err(Error::HdrInject {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!("Injection finished successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_extraction_carries_exit_code_and_stderr() {
        let mut producer = Command::new("sh");
        producer.args(["-c", "printf 'bitstream'"]);
        let mut consumer = Command::new("sh");
        consumer.args(["-c", "echo 'no RPU found' >&2; exit 2"]);

        let result = run_extraction(producer, consumer).await;
        match result {
            Err(Error::HdrExtract { code, stderr }) => {
                assert_eq!(code, 2);
                assert!(stderr.contains("no RPU found"));
            }
            other => panic!("expected HdrExtract error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_injection_carries_exit_code_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo 'bad sidecar' >&2; exit 5"]);

        let result = run_injection(cmd).await;
        match result {
            Err(Error::HdrInject { code, stderr }) => {
                assert_eq!(code, 5);
                assert!(stderr.contains("bad sidecar"));
            }
            other => panic!("expected HdrInject error, got {:?}", other),
        }
    }
}
