//! Key-value backends holding one JSON document per collection.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use civic_common::{AppError, AppResult};

/// Durable string storage addressed by key.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn read(&self, key: &str) -> AppResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn write(&self, key: &str, value: &str) -> AppResult<()>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> AppResult<()>;
}

fn validate_key(key: &str) -> AppResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Storage(format!("Invalid storage key: {key:?}")))
    }
}

/// Filesystem backend storing `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling file first and are renamed into place, so
/// a reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a backend rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));

        fs::write(&tmp, value)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| {
            AppError::Storage(format!("Failed to replace {}: {e}", path.display()))
        })
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-memory backend. Writes can be made to fail for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!(
                "Write to {key} rejected: storage quota exceeded"
            )));
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("civic-db-backend-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_file_store_roundtrip_and_remove() {
        let dir = temp_dir();
        let store = FileStore::open(&dir).unwrap();

        assert_eq!(store.read("pa_reports_v2").unwrap(), None);
        store.write("pa_reports_v2", "[]").unwrap();
        store.write("pa_reports_v2", "[1]").unwrap();
        assert_eq!(store.read("pa_reports_v2").unwrap().as_deref(), Some("[1]"));
        assert!(dir.join("pa_reports_v2.json").exists());
        assert!(!dir.join(".pa_reports_v2.json.tmp").exists());

        store.remove("pa_reports_v2").unwrap();
        store.remove("pa_reports_v2").unwrap();
        assert_eq!(store.read("pa_reports_v2").unwrap(), None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = temp_dir();
        let store = FileStore::open(&dir).unwrap();

        assert!(store.write("../escape", "x").is_err());
        assert!(store.read("").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_memory_store_failing_writes() {
        let store = MemoryStore::new();
        store.write("k", "v").unwrap();

        store.set_fail_writes(true);
        let err = store.write("k", "w").unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));

        store.set_fail_writes(false);
        store.write("k", "w").unwrap();
        assert_eq!(store.len(), 1);
    }
}
