//! In-process history storage

use campaign_core::{HistoryEntry, HistoryStore, StorageError};
use parking_lot::Mutex;

/// Keeps the last saved history log in memory
///
/// Nothing survives the process. Useful for tests and for running without a
/// history file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Option<Vec<HistoryEntry>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that loads `entries` on first use
    pub fn with_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Mutex::new(Some(entries)),
        }
    }

    /// Copy of the last saved log
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone().unwrap_or_default()
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<HistoryEntry>>, StorageError> {
        Ok(self.entries.lock().clone())
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), StorageError> {
        *self.entries.lock() = Some(entries.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_loads_none() {
        let store = MemoryStore::new();
        assert!(store.load().expect("Failed to load").is_none());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_save_overwrites() {
        let store = MemoryStore::with_entries(vec![HistoryEntry::start("a-1", "a")]);
        store
            .save(&[
                HistoryEntry::start("b-2", "b"),
                HistoryEntry::start("b-1", "b"),
            ])
            .expect("Failed to save");

        let loaded = store.load().expect("Failed to load").expect("history present");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].campaign_id, "b-2");
    }
}
