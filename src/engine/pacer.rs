use tokio::time::{Duration, Instant};

/// Outcome of advancing the tick deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerStep {
    /// Deadline moved forward by exactly one interval
    Advanced,
    /// Deadline had fallen more than one interval behind and was reset to now
    Resynchronized { behind: Duration },
}

/// Additive deadline arithmetic for a fixed-rate loop.
///
/// Each deadline is the previous one plus `interval`, never "now plus
/// interval", so the long-run average converges on the target rate. When the
/// loop falls more than a full interval behind, the deadline jumps to now
/// instead of replaying the backlog.
#[derive(Debug, Clone)]
pub struct TickPacer {
    interval: Duration,
    next_deadline: Instant,
}

impl TickPacer {
    /// The first deadline is `start`, so tick 0 fires immediately
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_deadline: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn advance(&mut self, now: Instant) -> PacerStep {
        let Some(next) = self.next_deadline.checked_add(self.interval) else {
            // Past the end of the clock: the best we can do is now
            self.next_deadline = now;
            return PacerStep::Resynchronized {
                behind: Duration::ZERO,
            };
        };
        self.next_deadline = next;
        if next.checked_add(self.interval).is_some_and(|late| late < now) {
            let behind = now - next;
            self.next_deadline = now;
            return PacerStep::Resynchronized { behind };
        }
        PacerStep::Advanced
    }
}
