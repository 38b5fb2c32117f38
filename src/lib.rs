// ============================================================================
// Migration Plan Library
// ============================================================================

//! Resumable, transactional migration plans.
//!
//! A [`MigrationPlan`] is a named chain of labelled states joined by
//! transitions. The [`PlanExecutor`] runs each pending transition in its own
//! store transaction and records the reached state in a [`StateStore`] right
//! after the commit, so a failed or interrupted run picks up where it
//! stopped.
//!
//! ```
//! use migration_plan::{
//!     Column, DataType, MemoryStore, MemoryTransaction, MigrationPlan, PlanExecutor,
//!     RecordingNotifier,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let plan = MigrationPlan::<MemoryStore>::new("core")
//!     .to_fn("v1", |tx: &mut MemoryTransaction| {
//!         tx.create_table_if_not_exists("users", vec![Column::new("id", DataType::Integer)])?;
//!         Ok(())
//!     });
//!
//! let notifier = Arc::new(RecordingNotifier::new());
//! let executor = PlanExecutor::new().with_notifier(notifier.clone());
//! let result = executor.execute(&plan, &store, &store).await;
//! assert!(result.successful());
//! assert_eq!(result.final_state(), "v1");
//! assert_eq!(notifier.len(), 1);
//! # });
//! ```

pub mod core;
pub mod executor;
pub mod notify;
pub mod plan;
pub mod prelude;
pub mod result;
pub mod state;
pub mod storage;
pub mod transaction;

pub use core::{
    Column, DataType, MigrationError, PlanIntegrityError, Result, Row, Schema, Value,
};
pub use executor::{ExecutorConfig, PlanExecutor, PlanStatus};
pub use notify::{BroadcastNotifier, CompletionNotifier, LogNotifier, RecordingNotifier};
pub use plan::{
    FnStep, MigrationPlan, NoopStep, PlanResult, StepRegistry, Transition, TransitionStep,
};
pub use result::{ExecutionResult, PlanExecuted, TransitionRecord};
pub use state::{FileStateStore, StateStore};
pub use storage::{DurabilityMode, MemoryStore, MemoryTransaction, TransactionalStore};
