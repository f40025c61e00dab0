use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;

// x265 rewrites one stderr status line in place:
//   [ 23.5%] 1234/5678 frames, 56.78 fps, 3456.78 kb/s
// or, when the total frame count is unknown:
//   1234 frames: 56.78 fps, 3456.78 kb/s
static ENCODE_PROGRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)(?:/\d+)? frames[,:]\s*([0-9.]+) fps,\s*([0-9.]+) kb/s").unwrap()
});

static AUDIO_TIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").unwrap());

static AUDIO_BITRATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bitrate=\s*([0-9.]+)kbits/s").unwrap());

static AUDIO_SPEED_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"speed=\s*([0-9.]+)x").unwrap());

/// Number of instantaneous rate samples kept for smoothing.
pub const RATE_WINDOW: usize = 500;

/// Line-oriented scanner for the video encoder's status output.
///
/// Keeps a rolling window of the most recent fps samples; the arithmetic
/// mean of the window smooths out per-scene rate swings before the ETA is
/// derived from it.
#[derive(Debug)]
pub struct EncodeProgress {
    total_frames: u64,
    rates: VecDeque<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSnapshot {
    pub done_frames: u64,
    pub total_frames: u64,
    pub smoothed_fps: f64,
    pub bitrate_kbps: f64,
    pub eta: String,
}

impl EncodeProgress {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            rates: VecDeque::with_capacity(RATE_WINDOW),
        }
    }

    /// Scans one stderr line; non-matching lines yield `None`.
    pub fn observe(&mut self, line: &str) -> Option<EncodeSnapshot> {
        let captures = ENCODE_PROGRESS_REGEX.captures(line)?;
        let done_frames: u64 = captures[1].parse().ok()?;
        let fps: f64 = captures[2].parse().ok()?;
        let bitrate_kbps: f64 = captures[3].parse().ok()?;

        if self.rates.len() == RATE_WINDOW {
            self.rates.pop_front();
        }
        self.rates.push_back(fps);

        let smoothed_fps = self.smoothed_fps();
        let eta = if smoothed_fps > 0.0 && self.total_frames > done_frames {
            format_clock((self.total_frames - done_frames) as f64 / smoothed_fps)
        } else {
            format_clock(0.0)
        };

        Some(EncodeSnapshot {
            done_frames,
            total_frames: self.total_frames,
            smoothed_fps,
            bitrate_kbps,
            eta,
        })
    }

    pub fn smoothed_fps(&self) -> f64 {
        if self.rates.is_empty() {
            return 0.0;
        }
        self.rates.iter().sum::<f64>() / self.rates.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.rates.len()
    }
}

/// Scanner for the audio decoder's stats line, measured against the track's
/// known duration.
#[derive(Debug)]
pub struct AudioProgress {
    total_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSnapshot {
    pub seconds: f64,
    pub percent: f64,
    pub bitrate_kbps: Option<f64>,
    pub speed: Option<f64>,
}

impl AudioProgress {
    pub fn new(total_duration: f64) -> Self {
        Self { total_duration }
    }

    pub fn observe(&self, line: &str) -> Option<AudioSnapshot> {
        let captures = AUDIO_TIME_REGEX.captures(line)?;
        let hours: u32 = captures[1].parse().ok()?;
        let minutes: u32 = captures[2].parse().ok()?;
        let seconds: u32 = captures[3].parse().ok()?;
        let centiseconds: u32 = captures[4].parse().ok()?;

        let elapsed = f64::from(hours * 3600 + minutes * 60 + seconds)
            + f64::from(centiseconds) / 100.0;
        let percent = if self.total_duration > 0.0 {
            (elapsed / self.total_duration * 100.0).min(100.0)
        } else {
            0.0
        };

        let bitrate_kbps = AUDIO_BITRATE_REGEX
            .captures(line)
            .and_then(|c| c[1].parse().ok());
        let speed = AUDIO_SPEED_REGEX
            .captures(line)
            .and_then(|c| c[1].parse().ok());

        Some(AudioSnapshot {
            seconds: elapsed,
            percent,
            bitrate_kbps,
            speed,
        })
    }
}

/// Formats a second count as `HH:MM:SS`.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--:--".to_string();
    }
    let total = seconds.round() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_line_parsing() {
        let mut progress = EncodeProgress::new(5678);
        let snapshot = progress
            .observe("[ 23.5%] 1234/5678 frames, 56.78 fps, 3456.78 kb/s, eta 00:01:18")
            .unwrap();

        assert_eq!(snapshot.done_frames, 1234);
        assert_eq!(snapshot.total_frames, 5678);
        assert_eq!(snapshot.smoothed_fps, 56.78);
        assert_eq!(snapshot.bitrate_kbps, 3456.78);
    }

    #[test]
    fn test_encode_line_without_total_frames() {
        let mut progress = EncodeProgress::new(0);
        let snapshot = progress
            .observe("1234 frames: 56.78 fps, 3456.78 kb/s")
            .unwrap();
        assert_eq!(snapshot.done_frames, 1234);
    }

    #[test]
    fn test_non_matching_lines_are_ignored() {
        let mut progress = EncodeProgress::new(1000);
        assert_eq!(progress.observe("y4m  [info]: 1920x1080 fps 24000/1001"), None);
        assert_eq!(progress.observe(""), None);
        assert_eq!(progress.sample_count(), 0);
    }

    #[test]
    fn test_rolling_window_evicts_old_samples() {
        let mut progress = EncodeProgress::new(100_000);

        // Feed more samples than the window holds at a constant rate; the
        // smoothed rate must stay pinned to it once old samples fall out.
        for i in 0..(RATE_WINDOW + 100) {
            progress.observe(&format!(
                "[ 10.0%] {}/100000 frames, 25.00 fps, 512.00 kb/s",
                i
            ));
        }

        assert_eq!(progress.sample_count(), RATE_WINDOW);
        assert_eq!(progress.smoothed_fps(), 25.0);
    }

    #[test]
    fn test_eta_from_smoothed_rate() {
        let mut progress = EncodeProgress::new(1000);
        let snapshot = progress
            .observe("[  0.0%] 0/1000 frames, 10.00 fps, 100.00 kb/s")
            .unwrap();
        // (1000 - 0) / 10 fps = 100 seconds
        assert_eq!(snapshot.eta, "00:01:40");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(3661.0), "01:01:01");
        assert_eq!(format_clock(86399.0), "23:59:59");
        assert_eq!(format_clock(f64::NAN), "--:--:--");
        assert_eq!(format_clock(f64::INFINITY), "--:--:--");
    }

    #[test]
    fn test_audio_line_parsing() {
        let progress = AudioProgress::new(100.0);
        let snapshot = progress
            .observe("size=    1024kB time=00:00:50.00 bitrate= 167.8kbits/s speed=25.4x")
            .unwrap();

        assert_eq!(snapshot.seconds, 50.0);
        assert_eq!(snapshot.percent, 50.0);
        assert_eq!(snapshot.bitrate_kbps, Some(167.8));
        assert_eq!(snapshot.speed, Some(25.4));
    }

    #[test]
    fn test_audio_percent_without_known_duration() {
        let progress = AudioProgress::new(0.0);
        let snapshot = progress
            .observe("size=     256kB time=00:00:10.00 bitrate= 160.0kbits/s speed=30.0x")
            .unwrap();
        assert_eq!(snapshot.percent, 0.0);
    }
}
