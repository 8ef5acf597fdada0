//! Application error types
//!
//! Top-level error type for server bootstrap and operational failures.
//! Per-request delivery failures are `pingme_core::DeliveryError`.

use pingme_core::DeliveryError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Server lifecycle errors (bind, accept, shutdown)
    #[error("Server error: {0}")]
    Server(String),

    // Delivery-core errors
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

/// Result type alias using `AppError`
pub type AppResult<T> = Result<T, AppError>;

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
