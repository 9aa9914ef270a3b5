use std::fmt;
use tokio::time::{Duration, Instant};

use super::StreamMetrics;

/// Throughput at one point in a run
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub frames: u64,
    pub datagrams: u64,
    pub send_errors: u64,
    pub resyncs: u64,
    pub wall_elapsed: Duration,
    /// Frames per second, NaN before any time has elapsed
    pub frame_rate: f64,
    /// Datagrams per second, NaN before any time has elapsed
    pub packet_rate: f64,
    pub avg_tick_busy_us: u64,
}

impl ProgressReport {
    pub fn from_metrics(metrics: &StreamMetrics, wall_elapsed: Duration) -> Self {
        let frames = metrics.frames_emitted();
        let datagrams = metrics.datagrams_sent();
        let secs = wall_elapsed.as_secs_f64();
        let (frame_rate, packet_rate) = if secs > 0.0 {
            (frames as f64 / secs, datagrams as f64 / secs)
        } else {
            (f64::NAN, f64::NAN)
        };

        Self {
            frames,
            datagrams,
            send_errors: metrics.send_errors(),
            resyncs: metrics.resyncs(),
            wall_elapsed,
            frame_rate,
            packet_rate,
            avg_tick_busy_us: metrics.avg_tick_busy_us(),
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} (~{:.1}Hz) packets={} packets/sec~{:.0}",
            self.frames, self.frame_rate, self.datagrams, self.packet_rate
        )?;
        if self.send_errors > 0 {
            write!(f, " send_errors={}", self.send_errors)?;
        }
        if self.resyncs > 0 {
            write!(f, " resyncs={}", self.resyncs)?;
        }
        write!(f, " tick_busy~{}us", self.avg_tick_busy_us)
    }
}

/// Emits a [`ProgressReport`] every `interval` of wall time.
///
/// Polled once per tick by the scheduler rather than driven by its own timer.
pub struct ProgressReporter {
    interval: Duration,
    started: Instant,
    last_report: Instant,
}

impl ProgressReporter {
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            started,
            last_report: started,
        }
    }

    pub fn maybe_report(&mut self, now: Instant, metrics: &StreamMetrics) -> Option<ProgressReport> {
        if now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }
        self.last_report = now;
        Some(ProgressReport::from_metrics(
            metrics,
            now.saturating_duration_since(self.started),
        ))
    }

    pub fn final_report(&self, now: Instant, metrics: &StreamMetrics) -> ProgressReport {
        ProgressReport::from_metrics(metrics, now.saturating_duration_since(self.started))
    }
}
