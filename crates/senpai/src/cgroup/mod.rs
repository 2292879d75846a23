//! Cgroup v2 memory interface.
//!
//! The controller never touches cgroupfs directly; it goes through the two
//! port traits below. Production uses the filesystem-backed implementations
//! in this module, tests use in-memory fakes.

mod limit;
mod psi;

pub use limit::{MemoryLimitFile, sanitize_limit};
pub use psi::{MemoryPressure, PressureRecord, PsiSource};

use senpai_common::SenpaiResult;

/// One observation of the cgroup's memory stall counter.
#[derive(Debug, Clone, Copy)]
pub struct StallSample {
    /// Cumulative stall microseconds since boot.
    pub total_usec: u64,
    /// Stall microseconds accumulated since the previous sample.
    ///
    /// Never negative: a counter that moved backwards (cgroup recreated)
    /// yields a delta of 0 and rebases the baseline.
    pub delta_usec: u64,
    /// The kernel's 10-second "some" stall average, percent.
    pub avg10: f64,
}

/// An enforced memory ceiling as the kernel reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitValue {
    /// No ceiling ("max").
    Max,
    /// A ceiling in bytes.
    Bytes(u64),
}

/// Reads the kernel's cumulative memory stall counter for one cgroup.
pub trait PressureSource {
    /// Take one sample, computing the stall delta since the previous call.
    ///
    /// Fails when the pressure interface is missing or unreadable; the
    /// controller cannot operate blind, so callers treat this as fatal.
    fn sample(&mut self) -> SenpaiResult<StallSample>;
}

/// Reads usage and actuates the memory ceiling for one cgroup.
pub trait LimitPort {
    /// Current resident memory of the cgroup, bytes.
    fn read_usage(&self) -> SenpaiResult<u64>;

    /// The ceiling currently enforced by the kernel.
    fn read_limit(&self) -> SenpaiResult<LimitValue>;

    /// Enforce a new ceiling, clamped into the configured bounds and
    /// aligned down to the page. Returns the value actually written.
    /// Writing the same value twice is a kernel no-op and must not error.
    fn write_limit(&mut self, bytes: u64) -> SenpaiResult<u64>;

    /// Write a ceiling verbatim, bypassing the bounds. Used to restore the
    /// pre-run ceiling on shutdown.
    fn reset_limit(&mut self, value: LimitValue) -> SenpaiResult<()>;
}
