//! Smooth token-bucket rate tracker.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{LimiterError, Result};

/// Seconds of unused capacity banked by default while the tracker is idle.
pub const DEFAULT_MAX_BURST_SECONDS: f64 = 1.0;

const MICROS_PER_SECOND: f64 = 1_000_000.0;
const NANOS_PER_MICRO: f64 = 1_000.0;

/// A thread-safe rate tracker that paces permits at a steady rate.
///
/// Capacity is reserved optimistically: a request is always granted at the
/// earliest free moment, and the permits it takes push that moment forward
/// for whoever comes next. A single large request therefore never waits for
/// itself; the following caller pays for it. Capacity left unused while idle
/// is banked as stored permits, up to `max_burst_seconds` worth of the rate,
/// and spent before fresh permits.
///
/// All bookkeeping happens under one mutex, so concurrent callers are never
/// granted the same slice of capacity.
#[derive(Debug)]
pub struct SmoothRateTracker {
    /// Reference point for all ticket times
    start: Instant,
    /// How many seconds of capacity may be stored while idle
    max_burst_seconds: f64,
    state: Mutex<TrackerState>,
}

#[derive(Debug)]
struct TrackerState {
    permits_per_second: f64,
    /// Microseconds between two permits at the steady rate
    stable_interval_micros: f64,
    max_permits: f64,
    stored_permits: f64,
    /// Time (micros since `start`) at which the next request is granted.
    /// Kept fractional so sub-microsecond intervals accumulate.
    next_free_ticket_micros: f64,
}

impl TrackerState {
    /// Bank capacity accrued since the last ticket.
    fn resync(&mut self, now_micros: f64) {
        if now_micros > self.next_free_ticket_micros {
            let idle_micros = now_micros - self.next_free_ticket_micros;
            let new_permits = idle_micros / self.stable_interval_micros;
            self.stored_permits = (self.stored_permits + new_permits).min(self.max_permits);
            self.next_free_ticket_micros = now_micros;
        }
    }

    /// Reserve `permits` and return the moment they may be used.
    fn reserve_earliest_available(&mut self, permits: u32, now_micros: f64) -> f64 {
        self.resync(now_micros);
        let moment = self.next_free_ticket_micros;

        let required = f64::from(permits);
        let stored_to_spend = required.min(self.stored_permits);
        let fresh_permits = required - stored_to_spend;
        let wait_micros = fresh_permits * self.stable_interval_micros;

        self.next_free_ticket_micros += wait_micros;
        self.stored_permits -= stored_to_spend;
        moment
    }

    fn apply_rate(&mut self, permits_per_second: f64, max_burst_seconds: f64, now_micros: f64) {
        self.resync(now_micros);

        let old_max_permits = self.max_permits;
        self.permits_per_second = permits_per_second;
        self.stable_interval_micros = MICROS_PER_SECOND / permits_per_second;
        self.max_permits = max_burst_seconds * permits_per_second;
        self.stored_permits = if old_max_permits == 0.0 {
            0.0
        } else {
            self.stored_permits * self.max_permits / old_max_permits
        };
    }
}

impl SmoothRateTracker {
    /// Create a tracker granting `permits_per_second` permits per second.
    ///
    /// The tracker starts with no stored permits: the first request is
    /// granted immediately, later ones are paced.
    pub fn new(permits_per_second: f64, max_burst_seconds: f64) -> Result<Self> {
        validate_rate(permits_per_second)?;
        if !max_burst_seconds.is_finite() || max_burst_seconds < 0.0 {
            return Err(LimiterError::InvalidConfig(format!(
                "max burst seconds must be a non-negative number, got {}",
                max_burst_seconds
            )));
        }

        Ok(Self {
            start: Instant::now(),
            max_burst_seconds,
            state: Mutex::new(TrackerState {
                permits_per_second,
                stable_interval_micros: MICROS_PER_SECOND / permits_per_second,
                max_permits: max_burst_seconds * permits_per_second,
                stored_permits: 0.0,
                next_free_ticket_micros: 0.0,
            }),
        })
    }

    /// Current rate in permits per second.
    pub fn rate(&self) -> f64 {
        self.state.lock().permits_per_second
    }

    /// Configured burst allowance in seconds.
    pub fn max_burst_seconds(&self) -> f64 {
        self.max_burst_seconds
    }

    /// Change the steady rate.
    ///
    /// Reservations already handed out keep their wait; stored permits are
    /// rescaled to the new burst capacity.
    pub fn set_rate(&self, permits_per_second: f64) -> Result<()> {
        self.set_rate_at(permits_per_second, Instant::now())
    }

    /// Change the steady rate as of `now`.
    pub fn set_rate_at(&self, permits_per_second: f64, now: Instant) -> Result<()> {
        validate_rate(permits_per_second)?;
        let now_micros = self.micros_since_start(now);
        self.state
            .lock()
            .apply_rate(permits_per_second, self.max_burst_seconds, now_micros);
        Ok(())
    }

    /// Reserve `permits` and return how long the caller must wait before using them.
    pub fn reserve(&self, permits: u32) -> Duration {
        self.reserve_at(permits, Instant::now())
    }

    /// Reserve `permits` as of `now`.
    pub fn reserve_at(&self, permits: u32, now: Instant) -> Duration {
        let now_micros = self.micros_since_start(now);
        let moment = self
            .state
            .lock()
            .reserve_earliest_available(permits, now_micros);
        wait_between(now_micros, moment)
    }

    /// Reserve `permits` only if they can be granted within `timeout`.
    ///
    /// Returns `None` without touching the bookkeeping otherwise.
    pub fn try_reserve(&self, permits: u32, timeout: Duration) -> Option<Duration> {
        self.try_reserve_at(permits, timeout, Instant::now())
    }

    /// Reserve `permits` as of `now` if they can be granted within `timeout`.
    pub fn try_reserve_at(&self, permits: u32, timeout: Duration, now: Instant) -> Option<Duration> {
        let now_micros = self.micros_since_start(now);
        let timeout_micros = timeout.as_nanos() as f64 / NANOS_PER_MICRO;

        let mut state = self.state.lock();
        if state.next_free_ticket_micros - timeout_micros > now_micros {
            return None;
        }
        let moment = state.reserve_earliest_available(permits, now_micros);
        Some(wait_between(now_micros, moment))
    }

    /// Reserve `permits` and wait until they are available.
    ///
    /// Returns the time spent waiting. A cancelled token aborts the wait with
    /// [`LimiterError::Cancelled`]; the reservation is not given back.
    pub async fn acquire(&self, permits: u32, cancel: &CancellationToken) -> Result<Duration> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled { permits });
        }

        let wait = self.reserve(permits);
        trace!(
            permits = permits,
            wait_ms = wait.as_millis() as u64,
            "Reserved permits"
        );

        if wait.is_zero() {
            return Ok(wait);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LimiterError::Cancelled { permits }),
            _ = tokio::time::sleep(wait) => Ok(wait),
        }
    }

    fn micros_since_start(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start);
        elapsed.as_nanos() as f64 / NANOS_PER_MICRO
    }
}

/// Time from `now_micros` until `moment_micros`, rounded to the nanosecond.
fn wait_between(now_micros: f64, moment_micros: f64) -> Duration {
    let wait_micros = (moment_micros - now_micros).max(0.0);
    // float to int casts saturate
    Duration::from_nanos((wait_micros * NANOS_PER_MICRO).round() as u64)
}

fn validate_rate(permits_per_second: f64) -> Result<()> {
    if permits_per_second.is_finite() && permits_per_second > 0.0 {
        Ok(())
    } else {
        Err(LimiterError::InvalidConfig(format!(
            "rate must be a positive number of permits per second, got {}",
            permits_per_second
        )))
    }
}
