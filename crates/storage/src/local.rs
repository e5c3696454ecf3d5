//! Per-device key/value persistence.
//!
//! Holds small JSON snapshots (question counter, auth session, freemium flag)
//! that outlive a single run but belong to the device rather than a user.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocalStoreError {
    #[error("local store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("local store is corrupt: {0}")]
    Corrupt(String),

    #[error("local store lock poisoned: {0}")]
    Poisoned(String),
}

/// Synchronous string key/value store, shaped like browser local storage.
pub trait LocalStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the backing medium cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// # Errors
    ///
    /// Returns `LocalStoreError` if the value cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// # Errors
    ///
    /// Returns `LocalStoreError` if the value cannot be removed.
    fn remove_item(&self, key: &str) -> Result<(), LocalStoreError>;
}

type Entries = BTreeMap<String, String>;

fn lock(entries: &Mutex<Entries>) -> Result<MutexGuard<'_, Entries>, LocalStoreError> {
    entries
        .lock()
        .map_err(|e| LocalStoreError::Poisoned(e.to_string()))
}

/// Volatile store used by tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalStore {
    entries: Arc<Mutex<Entries>>,
}

impl InMemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for InMemoryLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        lock(&self.entries)?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), LocalStoreError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Write-through store persisted as one JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileLocalStore {
    path: PathBuf,
    entries: Arc<Mutex<Entries>>,
}

impl JsonFileLocalStore {
    /// Open the store at `path`. A missing file starts empty.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Corrupt` if the file is not a JSON object of strings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Entries::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| LocalStoreError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Entries) -> Result<(), LocalStoreError> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| LocalStoreError::Corrupt(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for JsonFileLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut guard = lock(&self.entries)?;
        guard.insert(key.to_owned(), value.to_owned());
        self.flush(&guard)
    }

    fn remove_item(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut guard = lock(&self.entries)?;
        if guard.remove(key).is_some() {
            self.flush(&guard)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "secquiz-local-{name}-{}.json",
            uuid::Uuid::new_v4()
        ))
    }

    #[test]
    fn in_memory_store_round_trips_and_removes() {
        let store = InMemoryLocalStore::new();
        store.set_item("freemium-enabled", "false").unwrap();
        assert_eq!(
            store.get_item("freemium-enabled").unwrap().as_deref(),
            Some("false")
        );
        store.remove_item("freemium-enabled").unwrap();
        assert_eq!(store.get_item("freemium-enabled").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = scratch_path("reopen");
        {
            let store = JsonFileLocalStore::open(&path).unwrap();
            store.set_item("question-counter", "{}").unwrap();
        }
        let reopened = JsonFileLocalStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("question-counter").unwrap().as_deref(),
            Some("{}")
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = scratch_path("corrupt");
        fs::write(&path, "not json").unwrap();
        let err = JsonFileLocalStore::open(&path).unwrap_err();
        assert!(matches!(err, LocalStoreError::Corrupt(_)));
        let _ = fs::remove_file(&path);
    }
}
