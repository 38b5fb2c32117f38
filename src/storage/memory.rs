use super::persistence::{DurabilityMode, SnapshotManager, StoreSnapshot};
use super::{Catalog, Table, TransactionalStore};
use crate::core::{Column, MigrationError, Result, Row, Schema, Value};
use crate::state::StateStore;
use crate::transaction::{Change, TransactionId, TransactionManager, TransactionState, TransactionStats};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Committed {
    version: u64,
    catalog: Catalog,
}

/// Reference transactional store: typed tables plus key-value slots.
///
/// Transactions work on a copy-on-write clone of the committed catalog.
/// Commit swaps the clone in; rollback simply drops it. When opened on a
/// directory the catalog is snapshotted to disk before each commit returns,
/// so committed work and persisted markers survive a restart.
///
/// The store also implements [`StateStore`] over its key-value slots. Marker
/// writes through that interface are their own atomic commits.
pub struct MemoryStore {
    committed: RwLock<Committed>,
    transactions: TransactionManager,
    snapshots: Option<SnapshotManager>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Purely in-memory store.
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Committed {
                version: 0,
                catalog: Catalog::new(),
            }),
            transactions: TransactionManager::new(),
            snapshots: None,
        }
    }

    /// Opens (or creates) a durable store in `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open_with(data_dir, DurabilityMode::default())
    }

    pub fn open_with<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let snapshots = SnapshotManager::in_dir(data_dir, durability_mode);
        let (version, catalog) = match snapshots.load()? {
            Some(snapshot) => snapshot.into_catalog(),
            None => (0, Catalog::new()),
        };
        debug!(
            "Opened store at {} (version {}, {} tables)",
            snapshots.path().display(),
            version,
            catalog.table_names().len()
        );

        Ok(Self {
            committed: RwLock::new(Committed { version, catalog }),
            transactions: TransactionManager::new(),
            snapshots: Some(snapshots),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.snapshots.is_some()
    }

    /// Number of commits applied since the store was created.
    pub async fn version(&self) -> u64 {
        self.committed.read().await.version
    }

    pub async fn has_table(&self, name: &str) -> bool {
        self.committed.read().await.catalog.has_table(name)
    }

    pub async fn has_column(&self, table: &str, column: &str) -> bool {
        self.committed
            .read()
            .await
            .catalog
            .table(table)
            .is_some_and(|t| t.has_column(column))
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.committed.read().await.catalog.table_names()
    }

    pub async fn table_schema(&self, table: &str) -> Result<Schema> {
        let committed = self.committed.read().await;
        Ok(committed.catalog.require_table(table)?.schema().clone())
    }

    pub async fn row_count(&self, table: &str) -> Result<usize> {
        let committed = self.committed.read().await;
        Ok(committed.catalog.require_table(table)?.row_count())
    }

    pub async fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let committed = self.committed.read().await;
        Ok(committed.catalog.require_table(table)?.rows().to_vec())
    }

    pub async fn value(&self, key: &str) -> Option<String> {
        self.committed
            .read()
            .await
            .catalog
            .value(key)
            .map(str::to_string)
    }

    pub async fn transaction_stats(&self) -> TransactionStats {
        self.transactions.stats().await
    }

    /// Writes a new committed catalog, snapshotting it first when durable.
    fn install(&self, committed: &mut Committed, catalog: Catalog) -> Result<()> {
        let version = committed.version + 1;
        if let Some(snapshots) = &self.snapshots {
            snapshots.save(&StoreSnapshot::capture(version, &catalog))?;
        }
        committed.version = version;
        committed.catalog = catalog;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        let (base_version, working) = {
            let committed = self.committed.read().await;
            (committed.version, committed.catalog.clone())
        };
        let id = self.transactions.begin().await;
        debug!("Began {} at version {}", id, base_version);

        Ok(MemoryTransaction {
            id,
            state: TransactionState::Active,
            base_version,
            working,
            changes: Vec::new(),
            start_time: Instant::now(),
        })
    }

    async fn commit(&self, mut tx: MemoryTransaction) -> Result<()> {
        tx.ensure_active()?;
        let mut committed = self.committed.write().await;

        if committed.version != tx.base_version {
            drop(committed);
            self.transactions
                .finish(tx.id, TransactionState::Aborted)
                .await;
            return Err(MigrationError::Conflict(format!(
                "{} started at version {} but the store is at a newer version",
                tx.id, tx.base_version
            )));
        }

        let change_count = tx.changes.len();
        let catalog = std::mem::take(&mut tx.working);
        if let Err(err) = self.install(&mut committed, catalog) {
            drop(committed);
            warn!("Commit of {} failed: {}", tx.id, err);
            self.transactions
                .finish(tx.id, TransactionState::Aborted)
                .await;
            return Err(err);
        }
        let version = committed.version;
        drop(committed);

        tx.state = TransactionState::Committed;
        self.transactions.finish(tx.id, tx.state).await;
        debug!(
            "Committed {} ({} changes) as version {}",
            tx.id, change_count, version
        );
        Ok(())
    }

    async fn rollback(&self, mut tx: MemoryTransaction) -> Result<()> {
        tx.ensure_active()?;
        tx.state = TransactionState::Aborted;
        self.transactions.finish(tx.id, tx.state).await;
        debug!("Rolled back {} ({} changes discarded)", tx.id, tx.changes.len());
        Ok(())
    }

    async fn stage_marker(&self, tx: &mut MemoryTransaction, key: &str, value: &str) -> Result<bool> {
        tx.put_value(key, value)?;
        Ok(true)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.value(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut committed = self.committed.write().await;
        let mut catalog = committed.catalog.clone();
        catalog.put_value(key, value);
        self.install(&mut committed, catalog)
            .map_err(|e| MigrationError::StateStore(format!("Failed to persist '{}': {}", key, e)))
    }
}

// ============================================================================
// Transaction handle
// ============================================================================

/// Working copy handed to migration steps.
///
/// Every mutation is staged on the copy and recorded as a [`Change`];
/// nothing is visible outside the transaction until the store commits it.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: TransactionId,
    state: TransactionState,
    base_version: u64,
    working: Catalog,
    changes: Vec<Change>,
    start_time: Instant,
}

impl MemoryTransaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.state.is_active() {
            return Err(MigrationError::Store(format!(
                "Transaction {} is already {}",
                self.id, self.state
            )));
        }
        Ok(())
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.working.has_table(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.working
            .table(table)
            .is_some_and(|t| t.has_column(column))
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.working.require_table(name)
    }

    pub fn rows(&self, table: &str) -> Result<&[Row]> {
        Ok(self.working.require_table(table)?.rows())
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.working.value(key)
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<()> {
        self.ensure_active()?;
        self.working.create_table(name, columns.clone())?;
        self.changes.push(Change::CreateTable {
            table: name.to_string(),
            columns,
        });
        Ok(())
    }

    /// Creates the table unless it exists; returns whether it was created.
    pub fn create_table_if_not_exists(&mut self, name: &str, columns: Vec<Column>) -> Result<bool> {
        if self.working.has_table(name) {
            return Ok(false);
        }
        self.create_table(name, columns)?;
        Ok(true)
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.ensure_active()?;
        let table = self.working.drop_table(name)?;
        self.changes.push(Change::DropTable {
            table: name.to_string(),
            rows: table.row_count(),
        });
        Ok(())
    }

    pub fn add_column(&mut self, table: &str, column: Column) -> Result<()> {
        self.ensure_active()?;
        self.working.table_mut(table)?.add_column(column.clone())?;
        self.changes.push(Change::AddColumn {
            table: table.to_string(),
            column,
        });
        Ok(())
    }

    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
        self.ensure_active()?;
        self.working.table_mut(table)?.drop_column(column)?;
        self.changes.push(Change::DropColumn {
            table: table.to_string(),
            column: column.to_string(),
        });
        Ok(())
    }

    pub fn insert_row(&mut self, table: &str, row: Row) -> Result<()> {
        self.ensure_active()?;
        self.working.table_mut(table)?.insert(row.clone())?;
        self.changes.push(Change::InsertRow {
            table: table.to_string(),
            row,
        });
        Ok(())
    }

    /// Sets `column` on every row for which `f` yields a value.
    pub fn update_rows<F>(&mut self, table: &str, column: &str, f: F) -> Result<usize>
    where
        F: FnMut(&Row) -> Option<Value>,
    {
        self.ensure_active()?;
        let count = self.working.table_mut(table)?.update_column(column, f)?;
        self.changes.push(Change::UpdateRows {
            table: table.to_string(),
            column: column.to_string(),
            count,
        });
        Ok(count)
    }

    pub fn delete_rows<F>(&mut self, table: &str, predicate: F) -> Result<usize>
    where
        F: FnMut(&Row) -> bool,
    {
        self.ensure_active()?;
        let count = self.working.table_mut(table)?.delete_where(predicate);
        self.changes.push(Change::DeleteRows {
            table: table.to_string(),
            count,
        });
        Ok(count)
    }

    pub fn put_value(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_active()?;
        self.working.put_value(key, value);
        self.changes.push(Change::PutValue {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    pub fn remove_value(&mut self, key: &str) -> Result<Option<String>> {
        self.ensure_active()?;
        let previous = self.working.remove_value(key);
        self.changes.push(Change::RemoveValue {
            key: key.to_string(),
        });
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    fn id_column() -> Vec<Column> {
        vec![Column::new("id", DataType::Integer).not_null()]
    }

    #[tokio::test]
    async fn test_commit_makes_changes_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_table("t", id_column()).unwrap();
        tx.insert_row("t", vec![Value::Integer(1)]).unwrap();
        assert_eq!(tx.change_count(), 2);
        assert!(!store.has_table("t").await);

        store.commit(tx).await.unwrap();
        assert!(store.has_table("t").await);
        assert_eq!(store.row_count("t").await.unwrap(), 1);
        assert_eq!(store.version().await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_table("t", id_column()).unwrap();
        store.rollback(tx).await.unwrap();

        assert!(!store.has_table("t").await);
        let stats = store.transaction_stats().await;
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_stale_commit_conflicts() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.create_table("a", id_column()).unwrap();
        second.create_table("b", id_column()).unwrap();

        store.commit(first).await.unwrap();
        let err = store.commit(second).await.unwrap_err();
        assert!(matches!(err, MigrationError::Conflict(_)));
        assert!(store.has_table("a").await);
        assert!(!store.has_table("b").await);
    }

    #[tokio::test]
    async fn test_state_store_slots() {
        let store = MemoryStore::new();
        assert_eq!(store.get("plan:x").await.unwrap(), None);
        store.set("plan:x", "a").await.unwrap();
        store.set("plan:x", "b").await.unwrap();
        assert_eq!(store.get("plan:x").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_staged_marker_commits_with_changes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create_table("t", id_column()).unwrap();
        assert!(store.stage_marker(&mut tx, "plan:x", "a").await.unwrap());
        assert_eq!(store.get("plan:x").await.unwrap(), None);
        store.commit(tx).await.unwrap();

        assert_eq!(store.get("plan:x").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.version().await, 1);

        let mut tx = store.begin().await.unwrap();
        store.stage_marker(&mut tx, "plan:x", "b").await.unwrap();
        store.rollback(tx).await.unwrap();
        assert_eq!(store.get("plan:x").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_create_table_if_not_exists() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.create_table_if_not_exists("t", id_column()).unwrap());
        assert!(!tx.create_table_if_not_exists("t", id_column()).unwrap());
        assert_eq!(tx.change_count(), 1);
        store.commit(tx).await.unwrap();
    }
}
