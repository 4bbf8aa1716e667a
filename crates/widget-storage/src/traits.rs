//! Storage trait definitions.

use crate::{StorageResult, WidgetRecord};

/// Trait for widget record backends.
///
/// Calls are synchronous and may come from a state listener that runs while
/// the authentication session is locked, so implementations must not call
/// back into the widget.
pub trait StateStore: Send + Sync {
    /// Read the stored record, `None` when nothing has been saved yet.
    fn load(&self) -> StorageResult<Option<WidgetRecord>>;

    /// Replace the stored record.
    fn save(&self, record: &WidgetRecord) -> StorageResult<()>;

    /// Remove the stored record. Clearing an empty store is not an error.
    fn clear(&self) -> StorageResult<()>;
}
