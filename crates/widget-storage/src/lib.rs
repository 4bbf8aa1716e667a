//! Persistence for the biogate widget record.
//!
//! The widget writes its [`WidgetRecord`] on every state change and reads
//! it back on startup. Two backends are provided:
//! - [`FileStateStore`]: a JSON file, replaced atomically on save
//! - [`MemoryStateStore`]: process-local, for tests and `persist_state = false`

mod file;
mod memory;
mod traits;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use traits::StateStore;

use thiserror::Error;
pub use widget_protocol_types::WidgetRecord;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
