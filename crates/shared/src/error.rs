//! Application-wide error types.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request payload exceeds the configured ceiling.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External service error.
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::Configuration(_) | Self::ExternalService(_) => 500,
        }
    }

    /// Returns the client-facing message without the category prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::PayloadTooLarge(msg)
            | Self::Configuration(msg)
            | Self::ExternalService(msg) => msg,
        }
    }
}
