//! Bounded, persisted audit log of campaign start/stop events

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::campaign::{CampaignStatus, CampaignSummary, OutcomeCounts};
use crate::traits::HistoryStore;

/// Default history log capacity
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Event recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Campaign admitted and started
    Start,
    /// Campaign reached a terminal state
    Stop,
}

/// Terminal summary stored with a `stop` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryOutcome {
    /// Terminal status
    pub status: CampaignStatus,
    /// Run time in milliseconds
    pub duration_ms: u64,
    /// Final counters
    pub counts: OutcomeCounts,
    /// Whether the campaign achieved its objective
    pub success: bool,
}

/// One audit record. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Campaign identifier
    pub campaign_id: String,
    /// Tool identifier
    pub tool_id: String,
    /// Start or stop
    pub action: HistoryAction,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Terminal summary (stop entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<HistoryOutcome>,
    /// Failure text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    /// Entry for an admitted campaign
    pub fn start(campaign_id: impl Into<String>, tool_id: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            tool_id: tool_id.into(),
            action: HistoryAction::Start,
            timestamp: Utc::now(),
            outcome: None,
            error: None,
        }
    }

    /// Entry for a finished campaign
    pub fn stop(summary: &CampaignSummary) -> Self {
        let error = match summary.status {
            CampaignStatus::Failed => summary.reason.clone(),
            _ => None,
        };
        Self {
            campaign_id: summary.campaign_id.clone(),
            tool_id: summary.tool_id.clone(),
            action: HistoryAction::Stop,
            timestamp: summary.ended_at,
            outcome: Some(HistoryOutcome {
                status: summary.status,
                duration_ms: summary.duration_ms,
                counts: summary.counts,
                success: summary.success(),
            }),
            error,
        }
    }
}

/// Bounded, most-recent-first sequence of history entries
///
/// Appending beyond capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryLog {
    /// Create an empty log. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Restore from entries given most-recent-first, dropping any beyond capacity
    pub fn from_entries(entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        log.entries = entries.into_iter().take(log.capacity).collect();
        log
    }

    /// Add an entry at the front, truncating the tail on overflow
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Copy out the entries, most recent first
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Most recent `stop` entry for a campaign
    pub fn last_stop(&self, campaign_id: &str) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .find(|e| e.action == HistoryAction::Stop && e.campaign_id == campaign_id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// History log backed by durable storage, written through on every append
///
/// Storage failures are logged and otherwise ignored: the in-memory log stays
/// authoritative and campaigns are never affected.
pub struct PersistentHistory {
    log: HistoryLog,
    store: Arc<dyn HistoryStore>,
    version: u64,
    written: Arc<Mutex<u64>>,
}

impl PersistentHistory {
    /// Restore the log from storage. Missing or unreadable data yields an empty log.
    pub fn restore(store: Arc<dyn HistoryStore>, capacity: usize) -> Self {
        let log = match store.load() {
            Ok(Some(entries)) => {
                tracing::debug!(
                    target: "campaign::history",
                    entries = entries.len(),
                    "Restored history log"
                );
                HistoryLog::from_entries(entries, capacity)
            }
            Ok(None) => HistoryLog::new(capacity),
            Err(e) => {
                tracing::warn!(
                    target: "campaign::history",
                    error = %e,
                    "History storage unreadable, starting with an empty log"
                );
                HistoryLog::new(capacity)
            }
        };

        Self {
            log,
            store,
            version: 0,
            written: Arc::new(Mutex::new(0)),
        }
    }

    /// Append an entry and write the full log through to storage
    pub fn append(&mut self, entry: HistoryEntry) {
        self.record(entry).commit();
    }

    /// Append an entry in memory and return the write that persists it
    ///
    /// Lets the caller release its own locks before touching storage.
    /// Commits may run in any order; a snapshot older than one already
    /// written is discarded.
    pub fn record(&mut self, entry: HistoryEntry) -> PendingWrite {
        self.log.append(entry);
        self.version += 1;
        self.pending()
    }

    /// The write for the log as it stands
    ///
    /// Committing it returns once the current contents are in storage,
    /// whichever caller ends up performing the write.
    pub fn pending(&self) -> PendingWrite {
        PendingWrite {
            store: Arc::clone(&self.store),
            entries: self.log.to_vec(),
            version: self.version,
            written: Arc::clone(&self.written),
        }
    }

    /// The in-memory log
    pub fn log(&self) -> &HistoryLog {
        &self.log
    }
}

/// Snapshot of the history log waiting to be written to storage
#[must_use = "the snapshot is not persisted until it is committed"]
pub struct PendingWrite {
    store: Arc<dyn HistoryStore>,
    entries: Vec<HistoryEntry>,
    version: u64,
    written: Arc<Mutex<u64>>,
}

impl PendingWrite {
    /// Write the snapshot unless a newer one already reached storage
    pub fn commit(self) {
        let mut written = self.written.lock();
        if *written >= self.version {
            tracing::trace!(
                target: "campaign::history",
                version = self.version,
                "Skipping superseded history snapshot"
            );
            return;
        }

        if let Err(e) = self.store.save(&self.entries) {
            tracing::warn!(
                target: "campaign::history",
                error = %e,
                "Failed to persist history log"
            );
        }
        *written = self.version;
    }
}

impl std::fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("version", &self.version)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl std::fmt::Debug for PersistentHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentHistory")
            .field("entries", &self.log.len())
            .field("capacity", &self.log.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use parking_lot::Mutex;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry::start(format!("campaign-{n}"), "flood")
    }

    struct MockStore {
        saved: Mutex<Option<Vec<HistoryEntry>>>,
        fail_load: bool,
        fail_save: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                saved: Mutex::new(None),
                fail_load: false,
                fail_save: false,
            }
        }
    }

    impl HistoryStore for MockStore {
        fn load(&self) -> Result<Option<Vec<HistoryEntry>>, StorageError> {
            if self.fail_load {
                return Err(StorageError::Corrupt("bad bytes".into()));
            }
            Ok(self.saved.lock().clone())
        }

        fn save(&self, entries: &[HistoryEntry]) -> Result<(), StorageError> {
            if self.fail_save {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            *self.saved.lock() = Some(entries.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_log_fifo_truncation() {
        let capacity = 5;
        let k = 3;
        let mut log = HistoryLog::new(capacity);
        for n in 0..capacity + k {
            log.append(entry(n));
        }

        assert_eq!(log.len(), capacity);
        let ids: Vec<String> = log.iter().map(|e| e.campaign_id.clone()).collect();
        let expected: Vec<String> = (k..capacity + k)
            .rev()
            .map(|n| format!("campaign-{n}"))
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_from_entries_truncates() {
        let entries: Vec<HistoryEntry> = (0..10).map(entry).collect();
        let log = HistoryLog::from_entries(entries, 4);
        assert_eq!(log.len(), 4);
        assert_eq!(log.iter().next().map(|e| e.campaign_id.as_str()), Some("campaign-0"));
    }

    #[test]
    fn test_last_stop() {
        let mut log = HistoryLog::new(10);
        log.append(entry(1));
        assert!(log.last_stop("campaign-1").is_none());

        let mut stop = entry(1);
        stop.action = HistoryAction::Stop;
        log.append(stop);
        assert!(log.last_stop("campaign-1").is_some());
        assert!(log.last_stop("campaign-2").is_none());
    }

    #[test]
    fn test_persistent_history_write_through_roundtrip() {
        let store = Arc::new(MockStore::new());
        let mut history = PersistentHistory::restore(store.clone(), 10);
        assert!(history.log().is_empty());

        for n in 0..3 {
            history.append(entry(n));
        }

        let restored = PersistentHistory::restore(store, 10);
        assert_eq!(restored.log().to_vec(), history.log().to_vec());
    }

    #[test]
    fn test_persistent_history_corrupt_storage_starts_empty() {
        let store = Arc::new(MockStore {
            fail_load: true,
            ..MockStore::new()
        });
        let history = PersistentHistory::restore(store, 10);
        assert!(history.log().is_empty());
    }

    #[test]
    fn test_persistent_history_save_failure_keeps_memory() {
        let store = Arc::new(MockStore {
            fail_save: true,
            ..MockStore::new()
        });
        let mut history = PersistentHistory::restore(store, 10);
        history.append(entry(1));
        assert_eq!(history.log().len(), 1);
    }

    #[test]
    fn test_superseded_snapshot_not_written() {
        let store = Arc::new(MockStore::new());
        let mut history = PersistentHistory::restore(store.clone(), 10);

        let first = history.record(entry(1));
        let second = history.record(entry(2));
        second.commit();
        first.commit();

        let saved = store.saved.lock().clone().unwrap_or_default();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved, history.log().to_vec());
    }

    #[test]
    fn test_entry_serialization_skips_empty() {
        let json = serde_json::to_string(&entry(1)).unwrap();
        assert!(json.contains("\"action\":\"start\""));
        assert!(!json.contains("outcome"));
        assert!(!json.contains("error"));
    }
}
