//! Application-wide error types.
//!
//! Domain failures live in the core crate; this type only covers what can go
//! wrong before the engine exists, while the service is being configured.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration value is inconsistent with another one or out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Returns the error code used in logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
