use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::pacer::{PacerStep, TickPacer};
use super::state::{SchedulerState, StopReason};
use crate::core::{unix_timestamp, Packet, StreamConfig};
use crate::observability::{ProgressReporter, StreamMetrics};
use crate::signals::{logical_time, SignalPlan, WaveformSynthesizer};
use crate::transport::Transport;

/// Longest single sleep while waiting for a deadline; also bounds how long
/// a shutdown request can go unnoticed
pub const MAX_WAIT_STEP: Duration = Duration::from_millis(1);

/// Send errors logged individually before switching to sampled logging
const LOGGED_SEND_ERRORS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Ready,
    Cancelled,
}

/// Totals for a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub datagrams: u64,
    pub send_errors: u64,
    pub resyncs: u64,
    pub wall_elapsed: Duration,
    pub reason: StopReason,
}

/// Fixed-rate loop emitting one datagram per group per tick.
///
/// Waveforms are evaluated at logical time `frame / rate_hz`, so signal shape
/// is independent of scheduling jitter. Pacing uses additive deadlines with
/// resynchronization after falling more than one interval behind.
pub struct Scheduler {
    plan: Arc<SignalPlan>,
    rate_hz: f64,
    interval: Duration,
    log_interval: Duration,
    seed: u64,
    max_frames: Option<u64>,
    state: SchedulerState,
    metrics: Arc<StreamMetrics>,
}

impl Scheduler {
    /// Fails if `config` has a non-positive rate or log interval
    pub fn new(config: &StreamConfig, plan: Arc<SignalPlan>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            plan,
            rate_hz: config.rate_hz,
            interval: config.tick_interval(),
            log_interval: config.log_interval(),
            seed: config.seed,
            max_frames: config.max_frames,
            state: SchedulerState::Idle,
            metrics: Arc::new(StreamMetrics::new()),
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn metrics(&self) -> Arc<StreamMetrics> {
        self.metrics.clone()
    }

    pub fn plan(&self) -> &SignalPlan {
        &self.plan
    }

    fn transition(&mut self, target: SchedulerState) -> Result<()> {
        if !self.state.can_transition_to(&target) {
            return Err(anyhow!(
                "Invalid scheduler transition {} -> {}",
                self.state.name(),
                target.name()
            ));
        }
        self.state = target;
        Ok(())
    }

    /// Stream until `shutdown` fires (or its sender is dropped) or the frame
    /// limit is reached.
    ///
    /// The transport is owned for the duration of the run and dropped before
    /// returning, on every path.
    pub async fn run<T: Transport>(
        &mut self,
        mut transport: T,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<RunSummary> {
        self.transition(SchedulerState::Running)?;

        info!(
            "Streaming telemetry to {} at {:.1}Hz ({} groups x {} signals = {} signals/frame)",
            transport.describe(),
            self.rate_hz,
            self.plan.group_count(),
            self.plan.signals_per_group(),
            self.plan.total_signals()
        );

        let mut synth = WaveformSynthesizer::new(self.seed);
        let started = Instant::now();
        let mut pacer = TickPacer::new(self.interval, started);
        let mut reporter = ProgressReporter::new(self.log_interval, started);
        let mut frame = 0u64;

        let reason = loop {
            if self.max_frames.is_some_and(|max| frame >= max) {
                break StopReason::FrameLimit;
            }
            if wait_until(pacer.deadline(), &mut shutdown).await == WaitOutcome::Cancelled {
                break StopReason::Cancelled;
            }

            let tick_start = self.metrics.start_tick();
            self.emit_tick(frame, &mut synth, &mut transport).await;
            self.metrics.finish_tick(tick_start);
            self.metrics.record_frame();
            frame += 1;

            let now = Instant::now();
            if let PacerStep::Resynchronized { behind } = pacer.advance(now) {
                self.metrics.record_resync();
                debug!(frame, behind_ms = behind.as_millis() as u64, "fell behind, deadline reset to now");
            }
            if let Some(report) = reporter.maybe_report(now, &self.metrics) {
                info!("{}", report);
            }
        };

        drop(transport);
        let report = reporter.final_report(Instant::now(), &self.metrics);
        self.transition(SchedulerState::Stopped { reason })?;
        info!(?reason, "Stopped: {}", report);

        Ok(RunSummary {
            frames: report.frames,
            datagrams: report.datagrams,
            send_errors: report.send_errors,
            resyncs: report.resyncs,
            wall_elapsed: report.wall_elapsed,
            reason,
        })
    }

    async fn emit_tick<T: Transport>(
        &self,
        frame: u64,
        synth: &mut WaveformSynthesizer,
        transport: &mut T,
    ) {
        let elapsed = logical_time(frame, self.rate_hz);
        let timestamp = unix_timestamp();

        for group in self.plan.iter() {
            let values = synth.synthesize_group(group, elapsed);
            let packet = Packet::new(group.name.as_str(), values, timestamp, frame);

            let result = match packet.encode() {
                Ok(payload) => transport.send(&payload).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(bytes) => {
                    self.metrics.record_datagram(bytes);
                    trace!(group = %group.name, frame, bytes, "datagram sent");
                }
                Err(e) => {
                    let errors = self.metrics.record_send_error();
                    if errors <= LOGGED_SEND_ERRORS || errors % 1000 == 0 {
                        warn!(group = %group.name, frame, errors, "send failed: {:#}", e);
                    }
                }
            }
        }
    }
}

/// Block until `deadline` in steps of at most [`MAX_WAIT_STEP`], returning
/// early if shutdown is requested
async fn wait_until(deadline: Instant, shutdown: &mut broadcast::Receiver<()>) -> WaitOutcome {
    loop {
        match shutdown.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => return WaitOutcome::Cancelled,
        }

        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::Ready;
        }

        let step = (deadline - now).min(MAX_WAIT_STEP);
        tokio::select! {
            _ = sleep(step) => {}
            _ = shutdown.recv() => return WaitOutcome::Cancelled,
        }
    }
}
