//! The outer timing loop.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use senpai_common::SenpaiResult;

use crate::cgroup::{LimitPort, LimitValue, PressureSource};
use crate::controller::Controller;

/// Drives the controller once per interval until interrupted.
pub struct Driver<P, L> {
    controller: Controller<P, L>,
    period: Duration,
    original_limit: LimitValue,
}

impl<P: PressureSource, L: LimitPort> Driver<P, L> {
    /// Wrap a controller with its tick period and the pre-run ceiling to
    /// restore on shutdown.
    #[must_use]
    pub fn new(controller: Controller<P, L>, period: Duration, original_limit: LimitValue) -> Self {
        Self {
            controller,
            period,
            original_limit,
        }
    }

    /// Sleep, tick, repeat. Returns on ctrl-c after restoring the original
    /// ceiling; any controller error is fatal and propagated as-is.
    ///
    /// There is no cancellation mid-tick: a tick either completes fully or
    /// the loop exits between ticks.
    pub async fn run(mut self) -> SenpaiResult<()> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; consume it
        // so every controller tick sits one full period after baseline.
        ticker.tick().await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let status = self.controller.tick()?;
                    status.log();
                }
                _ = &mut shutdown => {
                    tracing::info!("Interrupted, restoring original memory limit");
                    self.restore();
                    return Ok(());
                }
            }
        }
    }

    /// Best effort: losing the pre-run ceiling is worth a warning, not a
    /// failed exit.
    fn restore(&mut self) {
        if let Err(err) = self.controller.reset_limit(self.original_limit) {
            tracing::warn!(error = %err, "Failed to restore original memory limit");
        }
    }
}
