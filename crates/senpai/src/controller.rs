//! The adaptive feedback controller.
//!
//! Each tick samples the cgroup's stall counter and accumulates the delta
//! into an integral. Crossing the pressure threshold triggers an immediate
//! upward backoff; a full probing window without crossing it triggers a
//! cautious downward probe. Step sizes ramp up while consecutive decisions
//! point the same way and saturate at the configured caps, so the limit
//! can oscillate around the working set without ever running away.

use chrono::Utc;

use senpai_common::SenpaiResult;

use crate::cgroup::{LimitPort, LimitValue, PressureSource};
use crate::config::Config;
use crate::status::Status;

/// What a tick decided to do with the limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Mid-window bookkeeping; the limit was left alone.
    Hold,
    /// A window elapsed without pressure; the limit was tightened.
    Probe {
        /// Fractional decrease applied.
        fraction: f64,
    },
    /// Accumulated stall crossed the threshold; the limit was raised.
    Backoff {
        /// Fractional increase applied.
        fraction: f64,
    },
}

/// Mutable controller state, updated in place every tick.
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// The memory ceiling currently enforced, bytes. Always within the
    /// configured bounds.
    pub current_limit: u64,
    /// Ticks remaining before the next scheduled probe.
    pub time_to_probe: u32,
    /// Stall microseconds accumulated since the last decision point.
    pub integral: u64,
    /// Probe decisions since the last backoff.
    pub consecutive_probes: u32,
    /// Backoff decisions since the last probe.
    pub consecutive_backoffs: u32,
}

/// The feedback loop: owns the controller state and the two cgroup ports,
/// decides and applies limit changes each tick.
pub struct Controller<P, L> {
    config: Config,
    pressure: P,
    limit: L,
    state: ControllerState,
}

impl<P: PressureSource, L: LimitPort> Controller<P, L> {
    /// Build the controller and perform the baseline reset: the ceiling
    /// starts at the workload's current usage, clamped into bounds and
    /// actuated immediately.
    pub fn new(config: Config, pressure: P, mut limit: L) -> SenpaiResult<Self> {
        let usage = limit.read_usage()?;
        let current_limit = limit.write_limit(usage)?;
        tracing::info!(
            limit = %senpai_common::ByteSize::from_bytes(current_limit),
            "Baseline limit set from current usage"
        );

        let state = ControllerState {
            current_limit,
            time_to_probe: config.probe_window(),
            integral: 0,
            consecutive_probes: 0,
            consecutive_backoffs: 0,
        };

        Ok(Self {
            config,
            pressure,
            limit,
            state,
        })
    }

    /// Observable controller state.
    #[must_use]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// One pass of the feedback loop: sample, decide, actuate, report.
    pub fn tick(&mut self) -> SenpaiResult<Status> {
        let sample = self.pressure.sample()?;
        self.state.integral += sample.delta_usec;
        let integral = self.state.integral;

        let decision = if integral >= self.config.pressure_threshold {
            self.backoff()?
        } else {
            if self.state.time_to_probe > 0 {
                self.state.time_to_probe -= 1;
            }
            if self.state.time_to_probe == 0 {
                self.probe()?
            } else {
                Decision::Hold
            }
        };

        let usage = self.limit.read_usage()?;

        #[allow(clippy::cast_precision_loss)]
        let pressure_estimate = sample.delta_usec as f64 / self.config.interval as f64;

        Ok(Status {
            timestamp: Utc::now(),
            limit_bytes: self.state.current_limit,
            usage_bytes: usage,
            avg10: sample.avg10,
            pressure_estimate,
            time_to_probe: self.state.time_to_probe,
            total_stall_usec: sample.total_usec,
            stall_delta_usec: sample.delta_usec,
            integral_usec: integral,
            decision,
        })
    }

    /// Hand the enforced ceiling back to a previously observed value,
    /// bypassing the bounds. Used by the driver on shutdown.
    pub fn reset_limit(&mut self, value: LimitValue) -> SenpaiResult<()> {
        self.limit.reset_limit(value)
    }

    /// Pressure indicates real contention: raise the limit now, with
    /// growing urgency while contention persists across windows.
    fn backoff(&mut self) -> SenpaiResult<Decision> {
        self.state.consecutive_backoffs += 1;
        self.state.consecutive_probes = 0;

        let fraction = ramp_fraction(
            self.config.max_backoff,
            self.state.consecutive_backoffs,
            self.config.backoff_ramp,
        );
        self.apply(1.0 + fraction)?;
        Ok(Decision::Backoff { fraction })
    }

    /// A quiet window is weak evidence the limit is still above the working
    /// set: shrink gradually, accelerating only as quiet windows repeat.
    fn probe(&mut self) -> SenpaiResult<Decision> {
        self.state.consecutive_probes += 1;
        self.state.consecutive_backoffs = 0;

        let fraction = ramp_fraction(
            self.config.max_probe,
            self.state.consecutive_probes,
            self.config.probe_ramp,
        );
        self.apply(1.0 - fraction)?;
        Ok(Decision::Probe { fraction })
    }

    /// Scale the ceiling, actuate it, and close out the decision window.
    fn apply(&mut self, factor: f64) -> SenpaiResult<()> {
        let requested = scale(self.state.current_limit, factor);
        self.state.current_limit = self.limit.write_limit(requested)?;
        self.state.integral = 0;
        self.state.time_to_probe = self.config.probe_window();
        Ok(())
    }
}

/// Saturating step ramp: approaches `max` as the streak extends, never
/// exceeds it, and restarts from near zero when the direction flips.
fn ramp_fraction(max: f64, streak: u32, ramp: f64) -> f64 {
    let fraction = max * (1.0 - (-f64::from(streak) / ramp).exp());
    fraction.min(max)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(limit: u64, factor: f64) -> u64 {
    (limit as f64 * factor) as u64
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn first_step_matches_ramp_formula() {
        let fraction = ramp_fraction(0.01, 1, 4.0);
        let expected = 0.01 * (1.0 - (-0.25f64).exp());
        assert!((fraction - expected).abs() < 1e-12);
    }

    #[test]
    fn scale_is_exact_for_round_factors() {
        assert_eq!(scale(1000, 2.0), 2000);
        assert_eq!(scale(1000, 0.5), 500);
    }

    proptest! {
        #[test]
        fn ramp_saturates_below_max(streak in 1u32..10_000, ramp in 0.1f64..100.0) {
            let fraction = ramp_fraction(1.0, streak, ramp);
            prop_assert!(fraction > 0.0);
            prop_assert!(fraction <= 1.0);
        }

        #[test]
        fn ramp_is_monotone_in_streak(streak in 1u32..10_000, ramp in 0.1f64..100.0) {
            let shorter = ramp_fraction(0.5, streak, ramp);
            let longer = ramp_fraction(0.5, streak + 1, ramp);
            prop_assert!(longer >= shorter);
        }
    }
}
