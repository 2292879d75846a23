//! Run configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use senpai_common::{ByteSize, SenpaiError, SenpaiResult};

/// Default lower bound on the computed limit.
pub const DEFAULT_MIN_SIZE: ByteSize = ByteSize::from_mebibytes(100);
/// Default upper bound on the computed limit.
pub const DEFAULT_MAX_SIZE: ByteSize = ByteSize::from_gibibytes(100);
/// Default seconds between controller ticks.
pub const DEFAULT_INTERVAL: u64 = 6;
/// Default stall microseconds per probing window that trigger a backoff.
pub const DEFAULT_PRESSURE_THRESHOLD: u64 = 10_000;
/// Default cap on the fractional downward step per tick.
pub const DEFAULT_MAX_PROBE: f64 = 0.01;
/// Default cap on the fractional upward step per tick.
pub const DEFAULT_MAX_BACKOFF: f64 = 1.0;
/// Default probe ramp time-constant, in ticks.
pub const DEFAULT_PROBE_RAMP: f64 = 4.0;
/// Default backoff ramp time-constant, in ticks.
pub const DEFAULT_BACKOFF_RAMP: f64 = 2.0;

/// Immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target cgroup directory, fully resolved.
    pub cgroup_path: PathBuf,
    /// Hard lower bound on the computed limit.
    pub min_size: ByteSize,
    /// Hard upper bound on the computed limit.
    pub max_size: ByteSize,
    /// Seconds between controller ticks; doubles as the probing window
    /// length in ticks.
    pub interval: u64,
    /// Stall microseconds per probing window that trigger a backoff.
    pub pressure_threshold: u64,
    /// Largest fractional downward step per tick.
    pub max_probe: f64,
    /// Largest fractional upward step per tick.
    pub max_backoff: f64,
    /// Ticks of consecutive probing before steps approach `max_probe`.
    pub probe_ramp: f64,
    /// Ticks of consecutive backoff before steps approach `max_backoff`.
    pub backoff_ramp: f64,
}

impl Config {
    /// Default configuration for a cgroup path.
    #[must_use]
    pub fn for_cgroup(cgroup_path: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_path: cgroup_path.into(),
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            interval: DEFAULT_INTERVAL,
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            max_probe: DEFAULT_MAX_PROBE,
            max_backoff: DEFAULT_MAX_BACKOFF,
            probe_ramp: DEFAULT_PROBE_RAMP,
            backoff_ramp: DEFAULT_BACKOFF_RAMP,
        }
    }

    /// Check the configuration for inconsistencies.
    ///
    /// Runs once at startup, before the loop touches the cgroup; any error
    /// here is fatal.
    pub fn validate(&self) -> SenpaiResult<()> {
        if self.min_size > self.max_size {
            return Err(config_error(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.interval == 0 {
            return Err(config_error("interval must be at least 1 second"));
        }
        if self.pressure_threshold == 0 {
            return Err(config_error("pressure threshold must be positive"));
        }
        if !(self.max_probe > 0.0 && self.max_probe < 1.0) {
            return Err(config_error(format!(
                "max_probe must be in (0, 1), got {}",
                self.max_probe
            )));
        }
        if self.max_backoff <= 0.0 {
            return Err(config_error(format!(
                "max_backoff must be positive, got {}",
                self.max_backoff
            )));
        }
        if self.probe_ramp <= 0.0 || self.backoff_ramp <= 0.0 {
            return Err(config_error("ramp time-constants must be positive"));
        }
        Ok(())
    }

    /// Length of the probing window, in ticks.
    #[must_use]
    pub fn probe_window(&self) -> u32 {
        u32::try_from(self.interval).unwrap_or(u32::MAX)
    }

    /// Wall-clock period of one controller tick.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

fn config_error(message: impl Into<String>) -> SenpaiError {
    SenpaiError::Config {
        message: message.into(),
    }
}

/// Optional TOML overlay; every field falls back to the CLI flag or the
/// built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Target cgroup.
    pub cgroup: Option<PathBuf>,
    /// Lower bound for the computed limit.
    pub min_size: Option<ByteSize>,
    /// Upper bound for the computed limit.
    pub max_size: Option<ByteSize>,
    /// Seconds between controller ticks.
    pub interval: Option<u64>,
    /// Stall microseconds per window that trigger a backoff.
    pub pressure_threshold: Option<u64>,
    /// Largest fractional downward step per tick.
    pub max_probe: Option<f64>,
    /// Largest fractional upward step per tick.
    pub max_backoff: Option<f64>,
    /// Probe ramp time-constant, in ticks.
    pub probe_ramp: Option<f64>,
    /// Backoff ramp time-constant, in ticks.
    pub backoff_ramp: Option<f64>,
}

impl ConfigFile {
    /// Load the overlay from a TOML file.
    pub fn load(path: &Path) -> SenpaiResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|err| config_error(err.to_string()))
    }
}
