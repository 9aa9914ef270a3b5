use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::signals::{PlanLimits, SignalPlanBuilder, MIN_GROUPS, MIN_SIGNALS_TOTAL};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 54431;
pub const DEFAULT_RATE_HZ: f64 = 50.0;
pub const DEFAULT_LOG_INTERVAL_SECS: f64 = 5.0;
pub const DEFAULT_SEED: u64 = 1337;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:0";

/// Longest accepted tick or log interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Immutable settings for one streaming run.
///
/// Built once at startup (defaults, then an optional JSON file, then command
/// line flags) and passed by reference to the plan builder and scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub groups: usize,
    pub signals_per_group: usize,
    pub rate_hz: f64,
    pub log_interval_secs: f64,
    pub seed: u64,

    /// Stop after this many ticks; run until cancelled when unset
    pub max_frames: Option<u64>,

    /// Local address the sending socket binds to
    pub bind_addr: String,

    pub limits: PlanLimits,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            groups: MIN_GROUPS,
            signals_per_group: MIN_SIGNALS_TOTAL.div_ceil(MIN_GROUPS),
            rate_hz: DEFAULT_RATE_HZ,
            log_interval_secs: DEFAULT_LOG_INTERVAL_SECS,
            seed: DEFAULT_SEED,
            max_frames: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            limits: PlanLimits::default(),
        }
    }
}

impl StreamConfig {
    pub fn from_json(config: serde_json::Value) -> Result<Self> {
        serde_json::from_value(config).context("Failed to parse stream config")
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            bail!("rate_hz must be positive, got {}", self.rate_hz);
        }
        if !(self.log_interval_secs.is_finite() && self.log_interval_secs > 0.0) {
            bail!(
                "log_interval_secs must be positive, got {}",
                self.log_interval_secs
            );
        }
        if !Duration::try_from_secs_f64(1.0 / self.rate_hz).is_ok_and(|d| d <= MAX_INTERVAL) {
            bail!(
                "rate_hz {} gives a tick interval longer than {:?}",
                self.rate_hz,
                MAX_INTERVAL
            );
        }
        if !Duration::try_from_secs_f64(self.log_interval_secs).is_ok_and(|d| d <= MAX_INTERVAL) {
            bail!(
                "log_interval_secs {} is longer than {:?}",
                self.log_interval_secs,
                MAX_INTERVAL
            );
        }
        if self.host.is_empty() {
            bail!("host must not be empty");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs_f64(self.log_interval_secs)
    }

    pub fn plan_builder(&self) -> SignalPlanBuilder {
        SignalPlanBuilder::new(self.seed)
            .groups(self.groups)
            .signals_per_group(self.signals_per_group)
            .limits(self.limits)
    }

    /// Resolve `host:port` to the first matching socket address
    pub fn destination(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("No address found for {}:{}", self.host, self.port))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind_addr))
    }
}
