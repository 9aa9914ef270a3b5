use serde::{Deserialize, Serialize};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Shutdown was signalled (or the signal sender went away)
    Cancelled,
    /// The configured frame limit was reached
    FrameLimit,
}

/// Scheduler lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped { reason: StopReason },
}

impl SchedulerState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &SchedulerState) -> bool {
        use SchedulerState::*;

        matches!((self, target), (Idle, Running) | (Running, Stopped { .. }))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stopped { .. } => "Stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::Idle
    }
}
