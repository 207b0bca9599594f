// src/store.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

use crate::error::CheckError;

/// Last-seen value per source. One value per key, no history.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, CheckError>;
    async fn save(&self, key: &str, value: &str) -> Result<(), CheckError>;
}

/// `<dir>/last_seen_<key>.txt`, stored byte-for-byte (no trimming on read).
///
/// With a legacy dir set, a key missing from `dir` is read from
/// `<legacy>/last_seen_<key>.txt` instead. Saves always go to `dir`, so the
/// legacy file is only consulted until the first change is recorded.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
    legacy_dir: Option<PathBuf>,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            legacy_dir: None,
        }
    }

    pub fn with_legacy_dir(mut self, legacy: impl Into<PathBuf>) -> Self {
        let legacy = legacy.into();
        self.legacy_dir = (legacy != self.dir).then_some(legacy);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

fn file_name(key: &str) -> String {
    format!("last_seen_{key}.txt")
}

async fn read_optional(path: &Path, key: &str) -> Result<Option<String>, CheckError> {
    match fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(key, e)),
    }
}

fn io_err(key: &str, source: std::io::Error) -> CheckError {
    CheckError::StoreIoFailed {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<String>, CheckError> {
        if let Some(v) = read_optional(&self.path_for(key), key).await? {
            return Ok(Some(v));
        }
        let Some(legacy) = &self.legacy_dir else {
            return Ok(None);
        };
        let path = legacy.join(file_name(key));
        let found = read_optional(&path, key).await?;
        if found.is_some() {
            tracing::info!(key, path = %path.display(), "using legacy state file");
        }
        Ok(found)
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), CheckError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_err(key, e))?;

        // Write aside, then rename over: readers see the old or the new value, never half.
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".last_seen_{key}.txt.tmp"));
        fs::write(&tmp, value.as_bytes())
            .await
            .map_err(|e| io_err(key, e))?;
        fs::rename(&tmp, &target)
            .await
            .map_err(|e| io_err(key, e))?;

        tracing::debug!(key, path = %target.display(), "state saved");
        Ok(())
    }
}

/// In-process store, used by tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value.to_string());
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<String>, CheckError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), CheckError> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested"));
        assert_eq!(store.load("month").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let v = "  2082 Shrawan \n(साउन)  ";
        store.save("month", v).await.unwrap();
        assert_eq!(store.load("month").await.unwrap().as_deref(), Some(v));
        assert!(store.path_for("month").ends_with("last_seen_month.txt"));
    }

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("macro", "old").await.unwrap();
        store.save("macro", "new").await.unwrap();
        assert_eq!(store.load("macro").await.unwrap().as_deref(), Some("new"));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn legacy_file_is_read_until_first_save() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("last_seen_month.txt"), "2082-83 Shrawan").unwrap();
        let store = FileStateStore::new(root.path().join("state")).with_legacy_dir(root.path());

        assert_eq!(
            store.load("month").await.unwrap().as_deref(),
            Some("2082-83 Shrawan")
        );
        assert_eq!(store.load("macro").await.unwrap(), None);

        store.save("month", "2082-83 Bhadra").await.unwrap();
        assert_eq!(
            store.load("month").await.unwrap().as_deref(),
            Some("2082-83 Bhadra")
        );
        assert!(store.path_for("month").exists());
    }

    #[test]
    fn legacy_dir_equal_to_state_dir_is_ignored() {
        let store = FileStateStore::new(".").with_legacy_dir(".");
        assert!(store.legacy_dir.is_none());
    }

    #[tokio::test]
    async fn unreadable_path_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        // A directory where the file should be makes the read fail with something other than NotFound.
        std::fs::create_dir_all(store.path_for("month")).unwrap();
        let err = store.load("month").await.unwrap_err();
        assert_eq!(err.kind(), "store_io_failed");
    }
}
