//! Error types for sana-client

use thiserror::Error;

/// Result type alias using sana-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the classification endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connectivity, DNS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Request was cancelled before completion
    #[error("Request aborted")]
    Aborted,

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse failure buckets used to word the user-facing apology message
/// after retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Too many requests (429)
    RateLimited,
    /// Backend failure (5xx or malformed payload)
    Server,
    /// Network-level failure (connect, timeout, DNS)
    Connectivity,
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is worth retrying.
    ///
    /// Connectivity failures, rate limits, and server errors (5xx) are
    /// transient; other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify this error for user-facing messaging.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::RateLimited { .. } => FailureKind::RateLimited,
            Error::Api { status, .. } if *status == 429 => FailureKind::RateLimited,
            Error::Api { .. } | Error::Json(_) => FailureKind::Server,
            _ => FailureKind::Connectivity,
        }
    }
}
