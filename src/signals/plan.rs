use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::ops::Range;

pub const MIN_GROUPS: usize = 20;
pub const MIN_SIGNALS_TOTAL: usize = 500;

const FREQUENCY_HZ: Range<f64> = 0.05..3.0;
const AMPLITUDE: Range<f64> = 0.5..5.0;
const PHASE: Range<f64> = 0.0..TAU;
const NOISE: Range<f64> = 0.01..0.15;

/// Waveform parameters of a single named signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub name: String,
    /// Hz
    pub base_frequency: f64,
    pub amplitude: f64,
    /// Radians
    pub phase: f64,
    pub noise_amplitude: f64,
}

/// Signals emitted together as one datagram per tick
#[derive(Debug, Clone, PartialEq)]
pub struct SignalGroup {
    pub name: String,
    pub signals: Vec<SignalSpec>,
}

/// Lower bounds every plan is raised to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanLimits {
    pub min_groups: usize,
    pub min_total_signals: usize,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            min_groups: MIN_GROUPS,
            min_total_signals: MIN_SIGNALS_TOTAL,
        }
    }
}

/// Fixed set of signal groups, built once and shared read-only
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPlan {
    groups: Vec<SignalGroup>,
}

impl SignalPlan {
    pub fn groups(&self) -> &[SignalGroup] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn signals_per_group(&self) -> usize {
        self.groups.first().map_or(0, |g| g.signals.len())
    }

    pub fn total_signals(&self) -> usize {
        self.groups.iter().map(|g| g.signals.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalGroup> {
        self.groups.iter()
    }
}

/// Derives a `SignalPlan` from a seed and requested sizes.
///
/// Parameters come from one seeded stream consumed group-major, signal-minor,
/// four draws per signal (frequency, amplitude, phase, noise). The same
/// inputs always produce the same plan.
#[derive(Debug, Clone)]
pub struct SignalPlanBuilder {
    groups: usize,
    signals_per_group: usize,
    seed: u64,
    limits: PlanLimits,
}

impl SignalPlanBuilder {
    pub fn new(seed: u64) -> Self {
        let limits = PlanLimits::default();
        Self {
            groups: limits.min_groups,
            signals_per_group: limits.min_total_signals.div_ceil(limits.min_groups),
            seed,
            limits,
        }
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn signals_per_group(mut self, signals_per_group: usize) -> Self {
        self.signals_per_group = signals_per_group;
        self
    }

    pub fn limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Group and per-group signal counts after applying the limits
    pub fn realized_sizes(&self) -> (usize, usize) {
        let groups = self.groups.max(self.limits.min_groups).max(1);
        let min_per_group = self.limits.min_total_signals.div_ceil(groups);
        (groups, self.signals_per_group.max(min_per_group))
    }

    pub fn build(&self) -> SignalPlan {
        let (group_count, signals_per_group) = self.realized_sizes();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let groups = (0..group_count)
            .map(|group_idx| {
                let signals = (0..signals_per_group)
                    .map(|signal_idx| SignalSpec {
                        name: format!("sig_{group_idx:02}_{signal_idx:03}"),
                        base_frequency: uniform(&mut rng, FREQUENCY_HZ),
                        amplitude: uniform(&mut rng, AMPLITUDE),
                        phase: uniform(&mut rng, PHASE),
                        noise_amplitude: uniform(&mut rng, NOISE),
                    })
                    .collect();
                SignalGroup {
                    name: format!("group_{group_idx:02}"),
                    signals,
                }
            })
            .collect();

        SignalPlan { groups }
    }
}

/// One draw from `rng`, mapped onto `range.start..range.end`
pub(crate) fn uniform(rng: &mut StdRng, range: Range<f64>) -> f64 {
    let u: f64 = rng.gen();
    range.start + (range.end - range.start) * u
}
