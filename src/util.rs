use std::time::{Duration, Instant};

/// Minimum spacing between two transfer-speed samples.
pub const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

const MIB: f64 = 1024.0 * 1024.0;

/// Render a transfer speed the way the progress line shows it.
#[must_use]
pub fn format_speed(megabytes_per_sec: f64) -> String {
    format!("{megabytes_per_sec:.2} MB/s")
}

/// Compute download progress as a percentage.
///
/// A total of zero is treated as one so a missing Content-Length can never
/// divide by zero. The result saturates at 100.
#[must_use]
pub fn progress_percent(downloaded: u64, total: u64) -> f32 {
    let total = total.max(1);
    ((downloaded as f64 / total as f64) * 100.0).min(100.0) as f32
}

/// Throttled transfer-rate sampler.
///
/// The rate is recomputed only once [`SPEED_SAMPLE_INTERVAL`] has passed since
/// the previous sample; in between, the last computed rate is reported.
#[derive(Debug)]
pub struct SpeedSampler {
    last_tick: Instant,
    last_bytes: u64,
    current: f64,
}

impl SpeedSampler {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_tick: now,
            last_bytes: 0,
            current: 0.0,
        }
    }

    /// Feed the cumulative byte count; returns the current rate in MB/s.
    pub fn sample(&mut self, downloaded: u64) -> f64 {
        self.sample_at(downloaded, Instant::now())
    }

    pub fn sample_at(&mut self, downloaded: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_tick);
        if elapsed >= SPEED_SAMPLE_INTERVAL {
            let bytes = downloaded.saturating_sub(self.last_bytes) as f64;
            self.current = bytes / MIB / elapsed.as_secs_f64();
            self.last_tick = now;
            self.last_bytes = downloaded;
        }
        self.current
    }
}

impl Default for SpeedSampler {
    fn default() -> Self {
        Self::new()
    }
}
