//! In-memory store.

use crate::{StateStore, StorageResult, WidgetRecord};
use parking_lot::Mutex;

/// Keeps the record in process memory only.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    record: Mutex<Option<WidgetRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a record already stored.
    pub fn with_record(record: WidgetRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> StorageResult<Option<WidgetRecord>> {
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &WidgetRecord) -> StorageResult<()> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.record.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStateStore::new();
        assert!(store.load().unwrap().is_none());

        let record = WidgetRecord {
            selected_country_code: "+44".to_string(),
            ..Default::default()
        };
        store.save(&record).unwrap();
        assert_eq!(store.load().unwrap(), Some(record));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
