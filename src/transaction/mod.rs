// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Transactions of the reference store are copy-on-write: a transaction
// works on its own catalog snapshot, commit swaps it in, rollback drops it.
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: Recorded changes for diagnostics
// - Copy-on-Write: Snapshot isolation
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use state::{TransactionId, TransactionState};
