//! Completion error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API error response
    #[error("Completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response had no usable reply
    #[error("Completion response contained no reply")]
    EmptyResponse,
}

impl CompletionError {
    /// Returns true if resending the same message might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http(e) => e.is_connect() || e.is_timeout(),
            CompletionError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

pub type CompletionResult<T> = Result<T, CompletionError>;
