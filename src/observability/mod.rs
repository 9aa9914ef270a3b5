pub mod metrics;
pub mod monitor;

pub use metrics::StreamMetrics;
pub use monitor::{ProgressReport, ProgressReporter};
