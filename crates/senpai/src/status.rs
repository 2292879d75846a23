//! Per-tick status records.

use chrono::{DateTime, Utc};

use senpai_common::ByteSize;

use crate::controller::Decision;

/// What the controller observed and decided on one tick.
///
/// This record is the controller's sole output; rendering it is the
/// logging layer's concern.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    /// When the tick ran.
    pub timestamp: DateTime<Utc>,
    /// The memory ceiling enforced after this tick, bytes.
    pub limit_bytes: u64,
    /// Resident memory of the cgroup at this tick, bytes.
    pub usage_bytes: u64,
    /// The kernel's 10-second stall average, percent.
    pub avg10: f64,
    /// Stall microseconds per wall-clock second over the last interval.
    pub pressure_estimate: f64,
    /// Ticks remaining before the next scheduled probe.
    pub time_to_probe: u32,
    /// Cumulative stall microseconds since boot.
    pub total_stall_usec: u64,
    /// Stall microseconds accumulated during this tick.
    pub stall_delta_usec: u64,
    /// Stall microseconds accumulated over the window, as sampled before
    /// any decision reset it.
    pub integral_usec: u64,
    /// What this tick did with the limit.
    pub decision: Decision,
}

impl Status {
    /// Emit the record through the logging layer.
    pub fn log(&self) {
        match self.decision {
            Decision::Probe { fraction } => tracing::debug!(fraction = -fraction, "adjust"),
            Decision::Backoff { fraction } => tracing::debug!(fraction, "adjust"),
            Decision::Hold => {}
        }

        tracing::info!(
            limit = %ByteSize::from_bytes(self.limit_bytes),
            usage = %ByteSize::from_bytes(self.usage_bytes),
            pressure = self.avg10,
            time_to_probe = self.time_to_probe,
            total = self.total_stall_usec,
            delta = self.stall_delta_usec,
            integral = self.integral_usec,
            "status"
        );
    }
}
