//! Resuming plans that failed half way through

use async_trait::async_trait;
use migration_plan::{
    Column, DataType, ExecutorConfig, MemoryStore, MemoryTransaction, MigrationError,
    MigrationPlan, PlanExecutor, RecordingNotifier, StateStore, TransitionStep,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

const TABLE_NAME: &str = "test_table";
const COLUMN_NAME: &str = "test_column";

struct CreateTableStep;

#[async_trait]
impl TransitionStep<MemoryStore> for CreateTableStep {
    async fn execute(&self, tx: &mut MemoryTransaction) -> anyhow::Result<()> {
        tx.create_table_if_not_exists(TABLE_NAME, vec![Column::new("id", DataType::Integer).not_null()])?;
        Ok(())
    }
}

struct AddColumnStep;

#[async_trait]
impl TransitionStep<MemoryStore> for AddColumnStep {
    async fn execute(&self, tx: &mut MemoryTransaction) -> anyhow::Result<()> {
        if !tx.has_column(TABLE_NAME, COLUMN_NAME) {
            tx.add_column(TABLE_NAME, Column::new(COLUMN_NAME, DataType::Text))?;
        }
        Ok(())
    }
}

/// Fails while `explode` is set; otherwise does nothing.
struct ErrorStep {
    explode: Arc<AtomicBool>,
}

#[async_trait]
impl TransitionStep<MemoryStore> for ErrorStep {
    async fn execute(&self, _tx: &mut MemoryTransaction) -> anyhow::Result<()> {
        if self.explode.load(Ordering::SeqCst) {
            anyhow::bail!("panic in migration step");
        }
        Ok(())
    }
}

fn quiet_executor() -> PlanExecutor {
    PlanExecutor::with_config(ExecutorConfig::new().with_log_completion(false)).unwrap()
}

fn abc_plan(explode: &Arc<AtomicBool>) -> MigrationPlan<MemoryStore> {
    MigrationPlan::new("test")
        .from("")
        .to("a", CreateTableStep)
        .to(
            "b",
            ErrorStep {
                explode: Arc::clone(explode),
            },
        )
        .to("c", AddColumnStep)
}

#[tokio::test]
async fn test_rerun_partially_completed_plan() {
    let store = MemoryStore::new();
    let explode = Arc::new(AtomicBool::new(true));
    let plan = abc_plan(&explode);
    let executor = quiet_executor();
    let key = executor.state_key(&plan);

    let result = executor.execute(&plan, &store, &store).await;

    assert!(!result.successful());
    assert_eq!(result.initial_state(), "");
    assert_eq!(result.final_state(), "a");
    assert_eq!(result.completed_transitions(), vec!["a"]);
    let error = result.error().unwrap();
    assert!(error.is_transition_failure());
    assert!(error.to_string().contains("panic in migration step"));

    // Partial progress is persisted and the first step's work is committed
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("a"));
    assert!(store.has_table(TABLE_NAME).await);
    assert!(!store.has_column(TABLE_NAME, COLUMN_NAME).await);

    // Someone fixes the broken step and runs the plan again
    explode.store(false, Ordering::SeqCst);
    let result = executor.execute(&plan, &store, &store).await;

    assert!(result.successful());
    assert!(result.error().is_none());
    assert_eq!(result.initial_state(), "a");
    assert_eq!(result.final_state(), "c");
    assert_eq!(result.completed_transitions(), vec!["b", "c"]);

    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("c"));
    assert!(store.has_table(TABLE_NAME).await);
    assert!(store.has_column(TABLE_NAME, COLUMN_NAME).await);
}

#[tokio::test]
async fn test_state_only_saved_when_a_step_succeeds() {
    let store = MemoryStore::new();
    let explode = Arc::new(AtomicBool::new(true));
    let plan = MigrationPlan::<MemoryStore>::new("test")
        .from("")
        .to(
            "a",
            ErrorStep {
                explode: Arc::clone(&explode),
            },
        )
        .to("b", CreateTableStep);
    let executor = quiet_executor();

    let result = executor.execute(&plan, &store, &store).await;

    assert!(!result.successful());
    assert!(matches!(
        result.error(),
        Some(MigrationError::TransitionExecution { from, to, .. }) if from.is_empty() && to == "a"
    ));
    assert!(result.completed_transitions().is_empty());
    assert_eq!(result.initial_state(), "");
    assert_eq!(result.final_state(), "");
    assert_eq!(store.get(&executor.state_key(&plan)).await.unwrap(), None);
    assert!(!store.has_table(TABLE_NAME).await);
}

#[tokio::test]
async fn test_failed_step_leaves_no_partial_writes() {
    let store = MemoryStore::new();
    let plan = MigrationPlan::<MemoryStore>::new("half")
        .to("a", CreateTableStep)
        .to_fn("b", |tx: &mut MemoryTransaction| {
            tx.add_column(TABLE_NAME, Column::new(COLUMN_NAME, DataType::Text))?;
            anyhow::bail!("fails after its first write")
        });
    let executor = quiet_executor();

    let result = executor.execute(&plan, &store, &store).await;

    assert_eq!(result.final_state(), "a");
    assert!(!store.has_column(TABLE_NAME, COLUMN_NAME).await);
    let stats = store.transaction_stats().await;
    assert_eq!(stats.active, 0);
    assert_eq!(stats.aborted, 1);
}

async fn run_replayed_plan(should_succeed: bool) {
    let store = MemoryStore::new();
    let explode = Arc::new(AtomicBool::new(!should_succeed));
    let plan = abc_plan(&explode).ignore_current_state(true);

    // A stale marker that replay must not look at
    store.set("plan:test", "c").await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let executor = quiet_executor().with_notifier(notifier.clone());
    let result = executor.execute(&plan, &store, &store).await;

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.run_id, result.run_id());
    assert_eq!(event.plan_name, "test");
    assert_eq!(event.initial_state, "");

    if should_succeed {
        assert!(event.successful);
        assert!(event.exception_summary.is_none());
        assert_eq!(event.final_state, "c");
        assert_eq!(event.completed_transition_count, 3);
    } else {
        assert!(!event.successful);
        assert!(
            event
                .exception_summary
                .as_deref()
                .unwrap()
                .contains("panic in migration step")
        );
        assert_eq!(event.final_state, "a");
        assert_eq!(event.completed_transition_count, 1);
    }
}

#[tokio::test]
async fn test_completion_published_on_success() {
    run_replayed_plan(true).await;
}

#[tokio::test]
async fn test_completion_published_on_failure() {
    run_replayed_plan(false).await;
}
