use crate::core::Result;
use async_trait::async_trait;

/// A store that can run a unit of work atomically.
///
/// The executor opens exactly one transaction per plan transition, hands it
/// to the transition's step and then either commits or rolls it back. The
/// transaction type is whatever handle the store's steps need to do their
/// work; the executor never looks inside it.
#[async_trait]
pub trait TransactionalStore: Send + Sync + 'static {
    type Transaction: Send + 'static;

    async fn begin(&self) -> Result<Self::Transaction>;

    /// Makes every change staged in `tx` durable and visible, or none of them.
    async fn commit(&self, tx: Self::Transaction) -> Result<()>;

    /// Discards every change staged in `tx`.
    async fn rollback(&self, tx: Self::Transaction) -> Result<()>;

    /// Stages a plan marker in `tx` so it commits together with the step.
    ///
    /// Only called when this store is also the executor's state store.
    /// Returns `false` when the store cannot hold markers in a transaction;
    /// the executor then writes the marker with `StateStore::set` after the
    /// commit.
    async fn stage_marker(
        &self,
        _tx: &mut Self::Transaction,
        _key: &str,
        _value: &str,
    ) -> Result<bool> {
        Ok(false)
    }
}
