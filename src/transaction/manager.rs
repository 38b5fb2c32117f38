// ============================================================================
// Transaction Manager
// ============================================================================

use super::{TransactionId, TransactionState};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Bookkeeping for transactions issued by a store.
///
/// The manager does not hold transaction data; it only tracks which
/// transactions are still open and how the finished ones ended.
pub struct TransactionManager {
    active_ids: Arc<RwLock<HashSet<TransactionId>>>,
    committed: AtomicU64,
    aborted: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionStats {
    pub active: usize,
    pub committed: u64,
    pub aborted: u64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            active_ids: Arc::new(RwLock::new(HashSet::new())),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    pub async fn begin(&self) -> TransactionId {
        let id = TransactionId::new();
        self.active_ids.write().await.insert(id);
        id
    }

    /// Marks `id` as finished with the given terminal state.
    ///
    /// Finishing an unknown or already finished transaction is a no-op so
    /// that a failed commit followed by a rollback is counted once.
    pub async fn finish(&self, id: TransactionId, state: TransactionState) {
        debug_assert!(state.is_terminal());
        if !self.active_ids.write().await.remove(&id) {
            return;
        }
        match state {
            TransactionState::Committed => {
                self.committed.fetch_add(1, Ordering::SeqCst);
            }
            TransactionState::Aborted => {
                self.aborted.fetch_add(1, Ordering::SeqCst);
            }
            TransactionState::Active => {}
        }
    }

    pub async fn stats(&self) -> TransactionStats {
        TransactionStats {
            active: self.active_ids.read().await.len(),
            committed: self.committed.load(Ordering::SeqCst),
            aborted: self.aborted.load(Ordering::SeqCst),
        }
    }
}
