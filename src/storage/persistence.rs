//! On-disk snapshots for the reference store.
//!
//! The whole catalog is written as one MessagePack document after every
//! commit. Writes go to a temporary file in the same directory which is then
//! renamed over the previous snapshot, so a crash leaves either the old or
//! the new snapshot on disk and never a torn one.

use super::{Catalog, Table};
use crate::core::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;
pub const SNAPSHOT_FILE_NAME: &str = "store.snapshot";

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurabilityMode {
    /// fsync every snapshot before the commit returns.
    #[default]
    Sync,
    /// Rename without fsync; survives process crashes but not power loss.
    Async,
}

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub format_version: u16,
    pub created_at_unix_ms: u64,
    /// Commit counter of the store at the time of the snapshot.
    pub version: u64,
    pub tables: Vec<Table>,
    pub values: BTreeMap<String, String>,
}

impl StoreSnapshot {
    pub fn capture(version: u64, catalog: &Catalog) -> Self {
        let created_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            created_at_unix_ms,
            version,
            tables: catalog.tables().cloned().collect(),
            values: catalog.values().clone(),
        }
    }

    pub fn into_catalog(self) -> (u64, Catalog) {
        (self.version, Catalog::from_parts(self.tables, self.values))
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
    durability_mode: DurabilityMode,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P, durability_mode: DurabilityMode) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
            durability_mode,
        }
    }

    /// Snapshot file inside a data directory.
    pub fn in_dir<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Self {
        Self::new(data_dir.as_ref().join(SNAPSHOT_FILE_NAME), durability_mode)
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let parent = match self.snapshot_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| {
            MigrationError::Io(format!("Failed to create snapshot directory: {}", e))
        })?;

        let serialized = rmp_serde::to_vec(snapshot).map_err(|e| {
            MigrationError::Store(format!("Failed to serialize snapshot: {}", e))
        })?;

        let mut temp = NamedTempFile::new_in(&parent)
            .map_err(|e| MigrationError::Io(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&serialized)
            .map_err(|e| MigrationError::Io(format!("Failed to write snapshot: {}", e)))?;
        temp.flush()
            .map_err(|e| MigrationError::Io(format!("Failed to flush snapshot: {}", e)))?;
        if self.durability_mode == DurabilityMode::Sync {
            temp.as_file()
                .sync_all()
                .map_err(|e| MigrationError::Io(format!("Failed to sync snapshot: {}", e)))?;
        }
        temp.persist(&self.snapshot_path)
            .map_err(|e| MigrationError::Io(format!("Failed to rename snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| MigrationError::Io(format!("Failed to open snapshot: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| MigrationError::Io(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data).map_err(|e| {
            MigrationError::Store(format!("Failed to deserialize snapshot: {}", e))
        })?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(MigrationError::Store(format!(
                "Unsupported snapshot format version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }

    pub fn delete(&self) -> Result<()> {
        if self.snapshot_path.exists() {
            fs::remove_file(&self.snapshot_path)
                .map_err(|e| MigrationError::Io(format!("Failed to delete snapshot: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Value};
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = SnapshotManager::in_dir(dir.path(), DurabilityMode::Sync);
        assert!(manager.load().unwrap().is_none());

        let mut catalog = Catalog::new();
        catalog
            .create_table("t", vec![Column::new("id", DataType::Integer)])
            .unwrap();
        catalog
            .table_mut("t")
            .unwrap()
            .insert(vec![Value::Integer(7)])
            .unwrap();
        catalog.put_value("plan:core", "b");

        manager.save(&StoreSnapshot::capture(3, &catalog)).unwrap();
        assert!(manager.exists());

        let (version, restored) = manager.load().unwrap().unwrap().into_catalog();
        assert_eq!(version, 3);
        assert_eq!(restored.require_table("t").unwrap().rows()[0][0], Value::Integer(7));
        assert_eq!(restored.value("plan:core"), Some("b"));

        manager.delete().unwrap();
        assert!(!manager.exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        let manager = SnapshotManager::in_dir(dir.path(), DurabilityMode::Async);
        fs::write(manager.path(), b"not msgpack at all").unwrap();
        assert!(manager.load().is_err());
    }
}
