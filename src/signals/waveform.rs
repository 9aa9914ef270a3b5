use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::TAU;

use super::plan::{uniform, SignalGroup, SignalSpec};

/// Transform applied to the stream seed to seed the noise generator
pub const NOISE_SEED_XOR: u64 = 0xABCDEF;

/// Evaluates signals at a logical time, adding bounded noise.
///
/// Noise comes from its own generator, separate from the one that built the
/// plan. Every call to [`sample`](Self::sample) consumes exactly one draw, so
/// two synthesizers with the same seed that are fed signals in plan order
/// produce identical values.
pub struct WaveformSynthesizer {
    noise_rng: StdRng,
}

impl WaveformSynthesizer {
    pub fn new(seed: u64) -> Self {
        Self {
            noise_rng: StdRng::seed_from_u64(seed ^ NOISE_SEED_XOR),
        }
    }

    /// Noise-free value of `spec` at logical time `t` seconds
    pub fn clean_value(spec: &SignalSpec, t: f64) -> f64 {
        spec.amplitude * (TAU * spec.base_frequency * t + spec.phase).sin()
    }

    pub fn sample(&mut self, spec: &SignalSpec, t: f64) -> f64 {
        // Draw even when the noise band is empty to keep the stream aligned
        let noise = uniform(
            &mut self.noise_rng,
            -spec.noise_amplitude..spec.noise_amplitude,
        );
        Self::clean_value(spec, t) + noise
    }

    /// Values for every signal of `group`, in group order
    pub fn synthesize_group(&mut self, group: &SignalGroup, t: f64) -> Vec<(String, f64)> {
        group
            .signals
            .iter()
            .map(|spec| (spec.name.clone(), self.sample(spec, t)))
            .collect()
    }
}

/// Logical elapsed time of `frame` at `rate_hz`
pub fn logical_time(frame: u64, rate_hz: f64) -> f64 {
    frame as f64 / rate_hz
}
