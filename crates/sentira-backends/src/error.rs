//! Backend error types.
//!
//! Every transport operation returns [`Result<T>`] with [`BackendError`]
//! as the error type. Errors never escape the dispatch layer above this
//! crate; they are converted into documented defaults there.

use thiserror::Error;

/// Errors that can occur when calling a scoring backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The request to the backend failed (non-2xx status, transport fault).
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Authentication was rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The backend returned a rate-limit response (HTTP 429).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before retrying, in milliseconds.
        retry_after_ms: u64,
    },

    /// The backend is not configured (missing API key, not registered).
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// The backend returned a response that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request timed out.
    #[error("timeout")]
    Timeout,

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
