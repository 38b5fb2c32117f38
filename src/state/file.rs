use super::StateStore;
use crate::core::{MigrationError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

/// Marker slots kept in a single JSON object on disk.
///
/// Every `get` re-reads the file so writes from other processes are seen.
/// Every `set` rewrites the whole file through a temporary file that is
/// fsynced and renamed into place.
pub struct FileStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored markers, keyed by marker key.
    pub fn entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path).map_err(|e| {
            MigrationError::StateStore(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;
        if data.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&data).map_err(|e| {
            MigrationError::StateStore(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| MigrationError::StateStore(format!("Failed to create directory: {}", e)))?;

        let serialized = serde_json::to_vec_pretty(entries)
            .map_err(|e| MigrationError::StateStore(format!("Failed to serialize markers: {}", e)))?;

        let mut temp = NamedTempFile::new_in(&parent)
            .map_err(|e| MigrationError::StateStore(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&serialized)
            .map_err(|e| MigrationError::StateStore(format!("Failed to write markers: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| MigrationError::StateStore(format!("Failed to sync markers: {}", e)))?;
        temp.persist(&self.path)
            .map_err(|e| MigrationError::StateStore(format!("Failed to rename markers: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("markers.json"));
        assert_eq!(store.get("plan:core").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_visible_to_second_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("markers.json");

        let writer = FileStateStore::new(&path);
        writer.set("plan:core", "a").await.unwrap();
        writer.set("plan:forms", "x").await.unwrap();
        writer.set("plan:core", "b").await.unwrap();

        let reader = FileStateStore::new(&path);
        assert_eq!(reader.get("plan:core").await.unwrap().as_deref(), Some("b"));
        assert_eq!(reader.entries().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_state_store_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("markers.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = FileStateStore::new(&path);
        let err = store.get("plan:core").await.unwrap_err();
        assert!(err.is_state_store());
    }
}
