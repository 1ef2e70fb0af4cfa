//! Configuration management for limiters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{LimiterError, Result};
use crate::limiter::{Limiter, RateBasedLimiter, RateUnit, DEFAULT_MAX_BURST_SECONDS};

/// Prefix for environment variable overrides (`PACER_RATE_LIMIT`, ...).
pub const ENV_PREFIX: &str = "PACER";

/// Limiting strategy to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterKind {
    /// Steady-rate pacing, see [`RateBasedLimiter`]
    #[default]
    RateBased,
}

/// Configuration for a single limiter.
///
/// ```yaml
/// type: rate_based
/// rate_limit: 120
/// time_unit: minutes
/// max_burst_seconds: 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Limiting strategy
    #[serde(default, rename = "type")]
    pub kind: LimiterKind,

    /// Permits allowed per `time_unit`
    pub rate_limit: f64,

    /// Unit `rate_limit` is expressed in
    #[serde(default)]
    pub time_unit: RateUnit,

    /// Seconds of unused capacity that may be banked while idle
    #[serde(default = "default_max_burst_seconds")]
    pub max_burst_seconds: f64,
}

fn default_max_burst_seconds() -> f64 {
    DEFAULT_MAX_BURST_SECONDS
}

impl LimiterConfig {
    /// Configuration for a rate based limiter at `rate_limit` permits per `time_unit`.
    pub fn rate_based(rate_limit: f64, time_unit: RateUnit) -> Self {
        Self {
            kind: LimiterKind::RateBased,
            rate_limit,
            time_unit,
            max_burst_seconds: default_max_burst_seconds(),
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse limiter config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file, overridden by
    /// `PACER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from_sources(path, None)
    }

    fn load_from_sources(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading limiter configuration");
            builder = builder.add_source(::config::File::from(path).format(::config::FileFormat::Yaml));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let config: LimiterConfig = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| LimiterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings without building a limiter.
    pub fn validate(&self) -> Result<()> {
        if !self.rate_limit.is_finite() || self.rate_limit <= 0.0 {
            return Err(LimiterError::InvalidConfig(format!(
                "rate_limit must be positive, got {}",
                self.rate_limit
            )));
        }
        if !self.max_burst_seconds.is_finite() || self.max_burst_seconds < 0.0 {
            return Err(LimiterError::InvalidConfig(format!(
                "max_burst_seconds must not be negative, got {}",
                self.max_burst_seconds
            )));
        }
        Ok(())
    }

    /// Rate in permits per second.
    pub fn permits_per_second(&self) -> f64 {
        self.time_unit.to_per_second(self.rate_limit)
    }

    /// Build a rate based limiter from this configuration.
    pub fn build_rate_based(&self) -> Result<RateBasedLimiter> {
        RateBasedLimiter::with_burst(self.rate_limit, self.time_unit, self.max_burst_seconds)
    }

    /// Build the configured limiter.
    pub fn build(&self) -> Result<Arc<dyn Limiter>> {
        self.validate()?;
        match self.kind {
            LimiterKind::RateBased => Ok(Arc::new(self.build_rate_based()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pacer-{}-{}.yaml", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = LimiterConfig::from_yaml("rate_limit: 10").unwrap();

        assert_eq!(config.kind, LimiterKind::RateBased);
        assert_eq!(config.rate_limit, 10.0);
        assert_eq!(config.time_unit, RateUnit::Seconds);
        assert_eq!(config.max_burst_seconds, DEFAULT_MAX_BURST_SECONDS);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
type: rate_based
rate_limit: 120
time_unit: minutes
max_burst_seconds: 0
"#;
        let config = LimiterConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.time_unit, RateUnit::Minutes);
        assert_eq!(config.max_burst_seconds, 0.0);
        assert_eq!(config.permits_per_second(), 2.0);
    }

    #[test]
    fn test_parse_rejects_missing_rate() {
        let err = LimiterConfig::from_yaml("time_unit: seconds").unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_unit() {
        let err = LimiterConfig::from_yaml("rate_limit: 1\ntime_unit: fortnights").unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_non_positive_rate() {
        let err = LimiterConfig::from_yaml("rate_limit: 0").unwrap_err();
        assert!(matches!(err, LimiterError::InvalidConfig(_)));

        let config = LimiterConfig::rate_based(-1.0, RateUnit::Seconds);
        assert!(config.validate().is_err());
        assert!(config.build().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_burst() {
        let mut config = LimiterConfig::rate_based(1.0, RateUnit::Seconds);
        config.max_burst_seconds = -0.5;
        assert!(matches!(config.validate(), Err(LimiterError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file() {
        let path = write_temp_config("from-file", "rate_limit: 30\ntime_unit: minute\n");
        let config = LimiterConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.permits_per_second(), 0.5);
    }

    #[test]
    fn test_from_missing_file() {
        let err = LimiterConfig::from_file("/nonexistent/pacer.yaml").unwrap_err();
        assert!(matches!(err, LimiterError::Io(_)));
    }

    #[test]
    fn test_load_with_env_overrides() {
        let path = write_temp_config("env", "rate_limit: 30\ntime_unit: minutes\n");
        let env = HashMap::from([("PACER_RATE_LIMIT".to_string(), "90".to_string())]);

        let config = LimiterConfig::load_from_sources(Some(&path), Some(env)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.rate_limit, 90.0);
        assert_eq!(config.time_unit, RateUnit::Minutes);
        assert_eq!(config.permits_per_second(), 1.5);
    }

    #[test]
    fn test_load_from_env_only() {
        let env = HashMap::from([
            ("PACER_RATE_LIMIT".to_string(), "4".to_string()),
            ("PACER_TIME_UNIT".to_string(), "hours".to_string()),
        ]);

        let config = LimiterConfig::load_from_sources(None, Some(env)).unwrap();
        assert_eq!(config.time_unit, RateUnit::Hours);
        assert_eq!(config.max_burst_seconds, DEFAULT_MAX_BURST_SECONDS);
    }

    #[test]
    fn test_load_without_rate_fails() {
        let err = LimiterConfig::load_from_sources(None, Some(HashMap::new())).unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_build_limiter() {
        let config = LimiterConfig::rate_based(600.0, RateUnit::Minutes);
        let limiter = config.build_rate_based().unwrap();
        assert_eq!(limiter.rate(), 10.0);

        let limiter = config.build().unwrap();
        assert!(limiter.release_permits(1).is_err());
    }
}
