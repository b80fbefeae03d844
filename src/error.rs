//! Saddlery error types

use std::time::Duration;

/// Saddlery error types.
///
/// `Clone` so that every caller joined onto a coalesced call receives the
/// same rejection the underlying fetch produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SaddleryError {
    // Backend/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("unauthorized")]
    Unauthorized,

    #[error("resource not found: {0}")]
    NotFound(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid cache key pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Optimizer lifecycle
    /// The task driving an in-flight call panicked or was cancelled.
    #[error("in-flight call aborted: {0}")]
    CallAborted(String),

    #[error("optimizer has been disposed")]
    Disposed,
}

impl SaddleryError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Network failures, rate limiting and 5xx responses are transient.
    /// Everything else (auth, 4xx, decoding, configuration) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SaddleryError {
    fn from(err: serde_json::Error) -> Self {
        SaddleryError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for SaddleryError {
    fn from(err: reqwest::Error) -> Self {
        SaddleryError::Http(err.to_string())
    }
}

/// Result type alias for Saddlery operations
pub type Result<T> = std::result::Result<T, SaddleryError>;
