//! History persisted as a JSON document on the local filesystem

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use campaign_core::{HistoryEntry, HistoryStore, StorageError};
use chrono::Utc;
use parking_lot::Mutex;

/// Stores the history log as a JSON array, most recent entry first
///
/// Every save rewrites the whole document through a temporary file and an
/// atomic rename, so readers never observe a partially written log.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by `path`. Nothing is touched until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the history document
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<HistoryEntry>>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let entries: Vec<HistoryEntry> = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", self.path.display())))?;

        tracing::debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "Loaded history document"
        );
        Ok(Some(entries))
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let _guard = self.write_lock.lock();
        atomic_write(&self.path, &bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .finish()
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("history");
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        name,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));

    let mut file = fs::File::create(&tmp)?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::HistoryAction;

    fn entries(n: usize) -> Vec<HistoryEntry> {
        (0..n)
            .map(|i| HistoryEntry::start(format!("flood-{i}"), "flood"))
            .collect()
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonFileStore::new(dir.path().join("history.json"));
        assert!(store.load().expect("Failed to load").is_none());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonFileStore::new(dir.path().join("history.json"));

        let saved = entries(3);
        store.save(&saved).expect("Failed to save");

        let loaded = store.load().expect("Failed to load").expect("history present");
        assert_eq!(loaded, saved);
        assert_eq!(loaded[0].campaign_id, "flood-0");
        assert_eq!(loaded[0].action, HistoryAction::Start);
    }

    #[test]
    fn test_save_replaces_previous_document() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonFileStore::new(dir.path().join("history.json"));

        store.save(&entries(5)).expect("Failed to save");
        store.save(&entries(2)).expect("Failed to save");

        let loaded = store.load().expect("Failed to load").expect("history present");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("state").join("history.json");
        let store = JsonFileStore::new(&path);

        store.save(&entries(1)).expect("Failed to save");
        assert!(path.exists());

        let files: Vec<_> = fs::read_dir(path.parent().expect("has parent"))
            .expect("Failed to read dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["history.json".to_string()]);
    }

    #[test]
    fn test_corrupt_document_reported() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("history.json");
        fs::write(&path, b"{ not json").expect("Failed to write");

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_empty_document_loads_none() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("history.json");
        fs::write(&path, b"\n").expect("Failed to write");

        let store = JsonFileStore::new(&path);
        assert!(store.load().expect("Failed to load").is_none());
    }
}
