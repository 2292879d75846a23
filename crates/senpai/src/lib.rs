//! # Senpai
//!
//! Senpai discovers the true working-set size of a cgroup'd workload by
//! applying controlled memory pressure and watching the kernel's
//! pressure-stall signal.
//!
//! Allocated memory is a poor proxy for required memory: cold pages linger
//! in cache. Senpai instead measures how much memory a workload can be
//! denied before it actually stalls, and keeps adapting that boundary as
//! load changes. The heart of it is a single feedback loop with asymmetric
//! dynamics: cautious downward probing, fast upward backoff.
//!
//! ## Usage
//!
//! ```no_run
//! use senpai::cgroup::{LimitPort, MemoryLimitFile, PsiSource};
//! use senpai::config::Config;
//! use senpai::controller::Controller;
//! use senpai::driver::Driver;
//!
//! # async fn example() -> senpai_common::SenpaiResult<()> {
//! let config = Config::for_cgroup("/sys/fs/cgroup/workload");
//! config.validate()?;
//!
//! let limit = MemoryLimitFile::new(
//!     &config.cgroup_path,
//!     config.min_size.get(),
//!     config.max_size.get(),
//! );
//! let original = limit.read_limit()?;
//! let pressure = PsiSource::new(&config.cgroup_path)?;
//!
//! let period = config.tick_period();
//! let controller = Controller::new(config, pressure, limit)?;
//! Driver::new(controller, period, original).run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cgroup;
pub mod cli;
pub mod config;
pub mod controller;
pub mod driver;
pub mod status;

pub use controller::Controller;
