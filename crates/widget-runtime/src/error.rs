//! Widget construction errors.

use thiserror::Error;

/// Errors building a widget. Runtime failures never surface as errors; they
/// become transcript messages.
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Authentication client error: {0}")]
    Auth(#[from] biometric_auth::AuthError),

    #[error("Completion client error: {0}")]
    Completion(#[from] chat_completion::CompletionError),

    #[error("Country directory error: {0}")]
    Countries(#[from] country_directory::CountryDirectoryError),

    #[error("Storage error: {0}")]
    Storage(#[from] widget_storage::StorageError),
}

pub type WidgetResult<T> = Result<T, WidgetError>;
