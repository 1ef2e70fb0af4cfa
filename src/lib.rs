//! Pacer - permit-based rate limiting
//!
//! This crate provides a pluggable [`Limiter`] abstraction that gates how fast
//! callers may proceed with units of work ("permits"). Callers wait until
//! capacity is available instead of failing. [`RateBasedLimiter`] paces
//! permits at a steady rate on top of a smoothing token bucket,
//! [`SmoothRateTracker`].

pub mod config;
pub mod error;
pub mod limiter;

pub use crate::config::{LimiterConfig, LimiterKind};
pub use crate::error::{LimiterError, Result};
pub use crate::limiter::{Limiter, LimiterState, RateBasedLimiter, RateUnit, SmoothRateTracker};
