//! CLI definition and the run glue.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

use senpai_common::{ByteSize, SenpaiError, SenpaiResult, resolve_cgroup};

use crate::cgroup::{LimitPort, MemoryLimitFile, PsiSource};
use crate::config::{
    Config, ConfigFile, DEFAULT_BACKOFF_RAMP, DEFAULT_INTERVAL, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_PROBE, DEFAULT_MIN_SIZE, DEFAULT_MAX_SIZE, DEFAULT_PRESSURE_THRESHOLD,
    DEFAULT_PROBE_RAMP,
};
use crate::controller::Controller;
use crate::driver::Driver;

const LONG_ABOUT: &str = "\
Senpai takes a cgroup and dynamically adjusts its memory limit between
--min-size and --max-size using psi memory pressure data.

Senpai targets cumulative memory delays of --pressure microseconds over a
probing window of --interval ticks. While observed pressure stays below the
target the limit is gradually tightened; the moment it crosses the target
the limit is raised again.

Corrective steps grow while consecutive decisions point the same way,
saturating at --max-probe and --max-backoff per tick after roughly
--probe-ramp and --backoff-ramp ticks respectively.";

/// Senpai - working-set size estimation via memory pressure
///
/// Every flag can also come from a `--config` TOML file; explicit flags
/// win over the file, the file wins over built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "senpai")]
#[command(author, version, about, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Target cgroup: an absolute cgroupfs directory, or a name relative
    /// to the hierarchy root
    pub cgroup: Option<PathBuf>,

    /// Lower bound for the computed limit [default: 100Mi]
    #[arg(long, env = "SENPAI_MIN_SIZE")]
    pub min_size: Option<ByteSize>,

    /// Upper bound for the computed limit [default: 100Gi]
    #[arg(long, env = "SENPAI_MAX_SIZE")]
    pub max_size: Option<ByteSize>,

    /// Seconds between controller ticks; also the probing window length in
    /// ticks [default: 6]
    #[arg(long, env = "SENPAI_INTERVAL")]
    pub interval: Option<u64>,

    /// Stall microseconds per probing window that trigger a backoff
    /// [default: 10000]
    #[arg(long = "pressure", env = "SENPAI_PRESSURE")]
    pub pressure_threshold: Option<u64>,

    /// Largest fractional downward step per tick [default: 0.01]
    #[arg(long)]
    pub max_probe: Option<f64>,

    /// Largest fractional upward step per tick [default: 1.0]
    #[arg(long)]
    pub max_backoff: Option<f64>,

    /// Ticks of consecutive probing before steps approach --max-probe
    /// [default: 4]
    #[arg(long)]
    pub probe_ramp: Option<f64>,

    /// Ticks of consecutive backoff before steps approach --max-backoff
    /// [default: 2]
    #[arg(long)]
    pub backoff_ramp: Option<f64>,

    /// Load settings from a TOML file
    #[arg(long, env = "SENPAI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit log records as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Run the tool to completion.
    pub async fn execute(self) -> Result<()> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        let config = self.resolved_config(&file)?;
        config.validate()?;

        tracing::info!(
            cgroup = %config.cgroup_path.display(),
            min_size = %config.min_size,
            max_size = %config.max_size,
            interval = config.interval,
            pressure = config.pressure_threshold,
            max_probe = config.max_probe,
            max_backoff = config.max_backoff,
            probe_ramp = config.probe_ramp,
            backoff_ramp = config.backoff_ramp,
            "Configuration"
        );

        let limit = MemoryLimitFile::new(
            &config.cgroup_path,
            config.min_size.get(),
            config.max_size.get(),
        );
        let original = limit.read_limit()?;
        let pressure = PsiSource::new(&config.cgroup_path)?;

        let period = config.tick_period();
        let controller = Controller::new(config, pressure, limit)?;
        Driver::new(controller, period, original).run().await?;

        Ok(())
    }

    /// Merge flags over the file overlay over built-in defaults.
    fn resolved_config(&self, file: &ConfigFile) -> SenpaiResult<Config> {
        let cgroup = self
            .cgroup
            .clone()
            .or_else(|| file.cgroup.clone())
            .ok_or_else(|| SenpaiError::Config {
                message: "no target cgroup (pass it as an argument or set 'cgroup' in the config file)".to_string(),
            })?;

        Ok(Config {
            cgroup_path: resolve_cgroup(&cgroup),
            min_size: self.min_size.or(file.min_size).unwrap_or(DEFAULT_MIN_SIZE),
            max_size: self.max_size.or(file.max_size).unwrap_or(DEFAULT_MAX_SIZE),
            interval: self.interval.or(file.interval).unwrap_or(DEFAULT_INTERVAL),
            pressure_threshold: self
                .pressure_threshold
                .or(file.pressure_threshold)
                .unwrap_or(DEFAULT_PRESSURE_THRESHOLD),
            max_probe: self.max_probe.or(file.max_probe).unwrap_or(DEFAULT_MAX_PROBE),
            max_backoff: self
                .max_backoff
                .or(file.max_backoff)
                .unwrap_or(DEFAULT_MAX_BACKOFF),
            probe_ramp: self.probe_ramp.or(file.probe_ramp).unwrap_or(DEFAULT_PROBE_RAMP),
            backoff_ramp: self
                .backoff_ramp
                .or(file.backoff_ramp)
                .unwrap_or(DEFAULT_BACKOFF_RAMP),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_unset_fields() {
        let cli = Cli::try_parse_from(["senpai", "workload"]).unwrap();
        let config = cli.resolved_config(&ConfigFile::default()).unwrap();

        assert_eq!(config.min_size, DEFAULT_MIN_SIZE);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert!(config.cgroup_path.ends_with("workload"));
    }

    #[test]
    fn flags_win_over_file_over_defaults() {
        let cli =
            Cli::try_parse_from(["senpai", "workload", "--min-size", "1Gi"]).unwrap();
        let file = ConfigFile {
            min_size: Some(ByteSize::from_mebibytes(256)),
            interval: Some(12),
            ..ConfigFile::default()
        };
        let config = cli.resolved_config(&file).unwrap();

        assert_eq!(config.min_size, ByteSize::from_gibibytes(1));
        assert_eq!(config.interval, 12);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
    }

    #[test]
    fn cgroup_may_come_from_the_file() {
        let cli = Cli::try_parse_from(["senpai"]).unwrap();
        let file = ConfigFile {
            cgroup: Some(PathBuf::from("/sys/fs/cgroup/from-file")),
            ..ConfigFile::default()
        };
        let config = cli.resolved_config(&file).unwrap();
        assert_eq!(config.cgroup_path, PathBuf::from("/sys/fs/cgroup/from-file"));
    }

    #[test]
    fn missing_cgroup_everywhere_is_an_error() {
        let cli = Cli::try_parse_from(["senpai"]).unwrap();
        let err = cli.resolved_config(&ConfigFile::default()).unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }
}
