//! Time units for configured rates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The time unit a rate limit is expressed in.
///
/// A limiter configured with `120` permits per [`RateUnit::Minutes`] runs at
/// `2` permits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    #[serde(alias = "nanosecond")]
    Nanoseconds,
    #[serde(alias = "microsecond")]
    Microseconds,
    #[serde(alias = "millisecond")]
    Milliseconds,
    #[default]
    #[serde(alias = "second")]
    Seconds,
    #[serde(alias = "minute")]
    Minutes,
    #[serde(alias = "hour")]
    Hours,
    #[serde(alias = "day")]
    Days,
}

impl RateUnit {
    /// Get the duration of one unit.
    pub fn duration(&self) -> Duration {
        match self {
            RateUnit::Nanoseconds => Duration::from_nanos(1),
            RateUnit::Microseconds => Duration::from_micros(1),
            RateUnit::Milliseconds => Duration::from_millis(1),
            RateUnit::Seconds => Duration::from_secs(1),
            RateUnit::Minutes => Duration::from_secs(60),
            RateUnit::Hours => Duration::from_secs(3600),
            RateUnit::Days => Duration::from_secs(86400),
        }
    }

    /// Length of one unit in seconds.
    pub fn seconds_per_unit(&self) -> f64 {
        self.duration().as_secs_f64()
    }

    /// Normalize a rate given per this unit into permits per second.
    pub fn to_per_second(&self, rate: f64) -> f64 {
        rate / self.seconds_per_unit()
    }

    fn as_str(&self) -> &'static str {
        match self {
            RateUnit::Nanoseconds => "nanoseconds",
            RateUnit::Microseconds => "microseconds",
            RateUnit::Milliseconds => "milliseconds",
            RateUnit::Seconds => "seconds",
            RateUnit::Minutes => "minutes",
            RateUnit::Hours => "hours",
            RateUnit::Days => "days",
        }
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_duration() {
        assert_eq!(RateUnit::Seconds.duration(), Duration::from_secs(1));
        assert_eq!(RateUnit::Minutes.duration(), Duration::from_secs(60));
        assert_eq!(RateUnit::Hours.duration(), Duration::from_secs(3600));
        assert_eq!(RateUnit::Days.duration(), Duration::from_secs(86400));
        assert_eq!(RateUnit::Milliseconds.duration(), Duration::from_millis(1));
    }

    #[test]
    fn test_to_per_second() {
        assert_eq!(RateUnit::Seconds.to_per_second(10.0), 10.0);
        assert_eq!(RateUnit::Minutes.to_per_second(120.0), 2.0);
        assert_eq!(RateUnit::Hours.to_per_second(7200.0), 2.0);
        assert_eq!(RateUnit::Days.to_per_second(86400.0), 1.0);
        assert!((RateUnit::Milliseconds.to_per_second(2.0) - 2000.0).abs() < 1e-9);
        assert!((RateUnit::Microseconds.to_per_second(1.0) - 1e6).abs() < 1e-3);
        assert!((RateUnit::Nanoseconds.to_per_second(1.0) - 1e9).abs() < 1.0);
        assert!((RateUnit::Nanoseconds.to_per_second(0.002) - 2e6).abs() < 1e-3);
    }

    #[test]
    fn test_default_is_seconds() {
        assert_eq!(RateUnit::default(), RateUnit::Seconds);
    }

    #[test]
    fn test_serde_names() {
        let unit: RateUnit = serde_yaml::from_str("minutes").unwrap();
        assert_eq!(unit, RateUnit::Minutes);

        let unit: RateUnit = serde_yaml::from_str("hour").unwrap();
        assert_eq!(unit, RateUnit::Hours);

        assert_eq!(RateUnit::Milliseconds.to_string(), "milliseconds");
    }
}
