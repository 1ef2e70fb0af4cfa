//! Rate based limiter implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::tracker::{SmoothRateTracker, DEFAULT_MAX_BURST_SECONDS};
use super::unit::RateUnit;
use super::{Limiter, LimiterState};
use crate::error::{LimiterError, Result};

const STRATEGY_NAME: &str = "RateBasedLimiter";

/// A [`Limiter`] that limits the rate of some events.
///
/// Acquiring permits waits (possibly for a while) and then always succeeds;
/// only cancellation interrupts it. Permit refills are not supported:
/// [`Limiter::release_permits`] always fails with
/// [`LimiterError::Unsupported`].
///
/// `start` and `stop` do no work beyond tracking the lifecycle state, since
/// the underlying [`SmoothRateTracker`] is ready at construction.
#[derive(Debug)]
pub struct RateBasedLimiter {
    tracker: SmoothRateTracker,
    state: RwLock<LimiterState>,
}

impl RateBasedLimiter {
    /// Create a limiter allowing `rate_limit` permits per second.
    pub fn new(rate_limit: f64) -> Result<Self> {
        Self::with_unit(rate_limit, RateUnit::Seconds)
    }

    /// Create a limiter allowing `rate_limit` permits per `unit`.
    pub fn with_unit(rate_limit: f64, unit: RateUnit) -> Result<Self> {
        Self::with_burst(rate_limit, unit, DEFAULT_MAX_BURST_SECONDS)
    }

    /// Create a limiter allowing `rate_limit` permits per `unit`, banking at
    /// most `max_burst_seconds` of unused capacity while idle.
    pub fn with_burst(rate_limit: f64, unit: RateUnit, max_burst_seconds: f64) -> Result<Self> {
        let permits_per_second = unit.to_per_second(rate_limit);
        let tracker = SmoothRateTracker::new(permits_per_second, max_burst_seconds)?;

        debug!(
            rate_limit = rate_limit,
            unit = %unit,
            permits_per_second = permits_per_second,
            max_burst_seconds = max_burst_seconds,
            "Created rate based limiter"
        );

        Ok(Self {
            tracker,
            state: RwLock::new(LimiterState::Uninitialized),
        })
    }

    /// Current rate in permits per second.
    pub fn rate(&self) -> f64 {
        self.tracker.rate()
    }

    /// Change the rate to `rate_limit` permits per `unit`.
    pub fn set_rate(&self, rate_limit: f64, unit: RateUnit) -> Result<()> {
        let permits_per_second = unit.to_per_second(rate_limit);
        self.tracker.set_rate(permits_per_second)?;
        debug!(
            permits_per_second = permits_per_second,
            "Updated rate based limiter rate"
        );
        Ok(())
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> LimiterState {
        *self.state.read()
    }

    /// Acquire `permits` only if they can be granted within `timeout`.
    ///
    /// Returns `Ok(false)` right away, consuming nothing, when the wait
    /// would exceed the timeout.
    pub async fn try_acquire_permits(&self, permits: u32, timeout: Duration) -> Result<bool> {
        check_permits(permits)?;
        self.warn_if_inactive("try_acquire_permits");

        match self.tracker.try_reserve(permits, timeout) {
            None => Ok(false),
            Some(wait) => {
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                Ok(true)
            }
        }
    }

    fn warn_if_inactive(&self, operation: &str) {
        let state = self.state();
        if state != LimiterState::Active {
            warn!(
                operation = operation,
                state = ?state,
                "Rate based limiter used outside of its active lifecycle"
            );
        }
    }
}

#[async_trait]
impl Limiter for RateBasedLimiter {
    fn start(&self) {
        *self.state.write() = LimiterState::Active;
        debug!(
            rate = self.rate(),
            max_burst_seconds = self.tracker.max_burst_seconds(),
            "Rate based limiter started"
        );
    }

    async fn acquire_permits_cancellable(
        &self,
        permits: u32,
        cancel: &CancellationToken,
    ) -> Result<Duration> {
        check_permits(permits)?;
        self.warn_if_inactive("acquire_permits");

        self.tracker.acquire(permits, cancel).await
    }

    fn release_permits(&self, _permits: u32) -> Result<()> {
        Err(LimiterError::Unsupported {
            operation: "Permit refills",
            strategy: STRATEGY_NAME,
        })
    }

    fn stop(&self) {
        *self.state.write() = LimiterState::Stopped;
        debug!("Rate based limiter stopped");
    }
}

fn check_permits(permits: u32) -> Result<()> {
    if permits == 0 {
        return Err(LimiterError::InvalidPermits(permits));
    }
    Ok(())
}
