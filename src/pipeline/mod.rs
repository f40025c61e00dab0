use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use crate::utils::{Error, Result};

pub mod progress;

/// Diagnostic lines retained per stream for error reporting.
const STDERR_TAIL_LINES: usize = 50;

/// Which side of the pair carries the live progress text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrSource {
    Producer,
    Consumer,
}

#[derive(Debug)]
pub struct PairOutcome {
    pub producer_status: ExitStatus,
    pub consumer_status: ExitStatus,
    pub producer_stderr: String,
    pub consumer_stderr: String,
}

/// Runs a producer and a consumer process concurrently, with the producer's
/// stdout wired directly into the consumer's stdin.
///
/// The pipe is handed over at the fd level, so the payload never passes
/// through this process and back-pressure falls out of the pipe's blocking
/// semantics. `on_line` is invoked for every diagnostic line of the watched
/// side; both stderr streams are drained either way and their tails kept for
/// error reporting. Resolves once both processes have terminated.
pub async fn run_pair<F>(
    mut producer: Command,
    mut consumer: Command,
    watch: StderrSource,
    mut on_line: F,
) -> Result<PairOutcome>
where
    F: FnMut(&str),
{
    producer
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut producer_child = producer.spawn()?;

    let upstream = producer_child
        .stdout
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("producer stdout was not captured")))?;
    let upstream: Stdio = upstream.try_into()?;

    consumer
        .stdin(upstream)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let mut consumer_child = consumer.spawn()?;

    let producer_stderr = producer_child
        .stderr
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("producer stderr was not captured")))?;
    let consumer_stderr = consumer_child
        .stderr
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("consumer stderr was not captured")))?;

    let (producer_tail, consumer_tail) = match watch {
        StderrSource::Producer => {
            let (p, c) = tokio::join!(
                pump_stderr(producer_stderr, Some(&mut on_line)),
                pump_stderr(consumer_stderr, None),
            );
            (p?, c?)
        }
        StderrSource::Consumer => {
            let (p, c) = tokio::join!(
                pump_stderr(producer_stderr, None),
                pump_stderr(consumer_stderr, Some(&mut on_line)),
            );
            (p?, c?)
        }
    };

    let producer_status = producer_child.wait().await?;
    let consumer_status = consumer_child.wait().await?;

    debug!(
        "Process pair finished: producer {}, consumer {}",
        producer_status, consumer_status
    );

    Ok(PairOutcome {
        producer_status,
        consumer_status,
        producer_stderr: producer_tail,
        consumer_stderr: consumer_tail,
    })
}

/// Drains a stderr stream, splitting on both `\n` and `\r` so tools that
/// rewrite a single status line in place still produce scannable lines.
pub(crate) async fn pump_stderr<R>(
    mut reader: R,
    mut sink: Option<&mut dyn FnMut(&str)>,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut carry = String::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        carry.push_str(&String::from_utf8_lossy(&buf[..n]));

        while let Some(pos) = carry.find(|c| c == '\r' || c == '\n') {
            let line: String = carry.drain(..=pos).collect();
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
            if line.is_empty() {
                continue;
            }
            if let Some(cb) = sink.as_mut() {
                cb(line);
            }
            push_tail(&mut tail, line);
        }
    }

    let leftover = carry.trim();
    if !leftover.is_empty() {
        if let Some(cb) = sink.as_mut() {
            cb(leftover);
        }
        push_tail(&mut tail, leftover);
    }

    Ok(tail.into_iter().collect::<Vec<_>>().join("\n"))
}

fn push_tail(tail: &mut VecDeque<String>, line: &str) {
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line.to_string());
}
