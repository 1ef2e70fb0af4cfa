//! Permit-based limiters and the rate tracking they are built on.

mod rate_based;
mod tracker;
mod unit;

pub use rate_based::RateBasedLimiter;
pub use tracker::{SmoothRateTracker, DEFAULT_MAX_BURST_SECONDS};
pub use unit::RateUnit;

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Lifecycle state of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterState {
    /// Constructed, `start` not yet called
    Uninitialized,
    /// Between `start` and `stop`
    Active,
    /// `stop` has been called
    Stopped,
}

/// Controls access to a limited resource through permits.
///
/// A limiter is constructed, started once, used from any number of tasks,
/// and stopped once. Using it outside of that window is a caller error.
///
/// This trait abstracts over limiting strategies so callers can hold an
/// `Arc<dyn Limiter>` and swap strategies through configuration.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Prepare the limiter for use.
    fn start(&self);

    /// Wait until `permits` are available, or until `cancel` fires.
    ///
    /// Succeeds once the permits are granted and returns the time spent
    /// waiting. A cancelled wait fails with
    /// [`LimiterError::Cancelled`](crate::LimiterError::Cancelled).
    async fn acquire_permits_cancellable(
        &self,
        permits: u32,
        cancel: &CancellationToken,
    ) -> Result<Duration>;

    /// Wait until `permits` are available.
    async fn acquire_permits(&self, permits: u32) -> Result<Duration> {
        self.acquire_permits_cancellable(permits, &CancellationToken::new())
            .await
    }

    /// Return previously acquired permits, for strategies that support refunds.
    fn release_permits(&self, permits: u32) -> Result<()>;

    /// Release whatever `start` acquired.
    fn stop(&self);
}
