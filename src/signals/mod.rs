pub mod plan;
pub mod waveform;

pub use plan::{
    PlanLimits, SignalGroup, SignalPlan, SignalPlanBuilder, SignalSpec, MIN_GROUPS,
    MIN_SIGNALS_TOTAL,
};
pub use waveform::{logical_time, WaveformSynthesizer, NOISE_SEED_XOR};
