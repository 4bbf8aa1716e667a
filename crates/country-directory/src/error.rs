//! Country directory error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CountryDirectoryError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Country endpoint returned HTTP {status}")]
    Status { status: u16 },

    /// Body was not a JSON array
    #[error("Invalid country payload: {0}")]
    Payload(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CountryDirectoryResult<T> = Result<T, CountryDirectoryError>;
