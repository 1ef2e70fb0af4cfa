//! Error types for Pacer.

use thiserror::Error;

/// Main error type for limiter operations.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// A waiting acquisition was cancelled before the permits were granted
    #[error("Acquisition of {permits} permit(s) was cancelled")]
    Cancelled { permits: u32 },

    /// The strategy does not implement the requested operation
    #[error("{operation} are not supported in {strategy}")]
    Unsupported {
        operation: &'static str,
        strategy: &'static str,
    },

    /// Invalid limiter settings (rate, burst)
    #[error("Invalid limiter configuration: {0}")]
    InvalidConfig(String),

    /// Permit counts must be positive
    #[error("Permits must be positive, got {0}")]
    InvalidPermits(u32),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LimiterError {
    /// Whether this error came from a cancelled wait.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LimiterError::Cancelled { .. })
    }
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
