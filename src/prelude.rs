//! Recommended imports grouped by abstraction level.
//!
//! `plans` covers writing and running plans. `advanced` exposes the storage
//! internals needed to implement a custom store.

pub mod plans {
    //! Everything an application needs to declare and run migration plans.
    pub use crate::{
        Column, CompletionNotifier, DataType, ExecutionResult, ExecutorConfig, FnStep,
        MemoryStore, MemoryTransaction, MigrationError, MigrationPlan, NoopStep, PlanExecutor,
        Result, StateStore, TransactionalStore, TransitionStep, Value,
    };
}

pub mod advanced {
    //! Building blocks for custom stores and state backends.
    pub use crate::storage::{Catalog, SnapshotManager, StoreSnapshot, Table};
    pub use crate::transaction::{Change, TransactionId, TransactionManager, TransactionState};
}
