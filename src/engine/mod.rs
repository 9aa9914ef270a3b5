pub mod pacer;
pub mod scheduler;
pub mod state;

pub use pacer::{PacerStep, TickPacer};
pub use scheduler::{RunSummary, Scheduler, MAX_WAIT_STEP};
pub use state::{SchedulerState, StopReason};
