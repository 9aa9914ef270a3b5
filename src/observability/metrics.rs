use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one streaming run, shared with observers through `Arc`
pub struct StreamMetrics {
    frames_emitted: AtomicU64,
    datagrams_sent: AtomicU64,
    send_errors: AtomicU64,
    bytes_sent: AtomicU64,
    resyncs: AtomicU64,
    total_tick_busy_us: AtomicU64,
    tick_samples: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            frames_emitted: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
            total_tick_busy_us: AtomicU64::new(0),
            tick_samples: AtomicU64::new(0),
        }
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::Relaxed)
    }

    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent.load(Ordering::Relaxed)
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs.load(Ordering::Relaxed)
    }

    pub fn record_frame(&self) {
        self.frames_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_datagram(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Returns the running error count including this one
    pub fn record_send_error(&self) -> u64 {
        self.send_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_resync(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_tick(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_tick(&self, start: Instant) {
        let busy_us = start.elapsed().as_micros() as u64;
        self.total_tick_busy_us.fetch_add(busy_us, Ordering::Relaxed);
        self.tick_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean time spent synthesizing, encoding and sending one tick
    pub fn avg_tick_busy_us(&self) -> u64 {
        let samples = self.tick_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_tick_busy_us.load(Ordering::Relaxed) / samples
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}
