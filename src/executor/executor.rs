use super::ExecutorConfig;
use crate::core::{MigrationError, Result};
use crate::notify::{CompletionNotifier, LogNotifier};
use crate::plan::{MigrationPlan, Transition};
use crate::result::{ExecutionResult, TransitionRecord};
use crate::state::StateStore;
use crate::storage::TransactionalStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Level, event, info_span};

/// Where a plan stands, without running anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStatus {
    pub plan_name: String,
    pub current_state: String,
    pub final_state: String,
    pub pending: Vec<String>,
}

impl PlanStatus {
    pub fn upgrade_required(&self) -> bool {
        self.current_state != self.final_state
    }
}

/// Runs migration plans one transition per transaction.
///
/// When the state store is the data store itself, the marker of a plan is
/// staged in each transition's own transaction and commits with it. A
/// separate state store is written right after the commit instead, which
/// leaves a window where a crash re-runs the last committed step. Either
/// way an interrupted run resumes at the first transition that did not
/// commit its marker.
///
/// Runs of the same plan must be serialized by the caller; the executor
/// takes no locks of its own.
pub struct PlanExecutor {
    config: ExecutorConfig,
    notifiers: Vec<Arc<dyn CompletionNotifier>>,
}

impl Default for PlanExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanExecutor {
    pub fn new() -> Self {
        Self::from_valid_config(ExecutorConfig::default())
    }

    /// Fails with `MigrationError::Config` when `config` does not validate.
    pub fn with_config(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ExecutorConfig) -> Self {
        let mut notifiers: Vec<Arc<dyn CompletionNotifier>> = Vec::new();
        if config.log_completion {
            notifiers.push(Arc::new(LogNotifier));
        }
        Self { config, notifiers }
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn CompletionNotifier>) {
        self.notifiers.push(notifier);
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.add_notifier(notifier);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Marker key used for `plan`.
    pub fn state_key<S: TransactionalStore>(&self, plan: &MigrationPlan<S>) -> String {
        plan.state_key(&self.config.state_key_prefix)
    }

    /// Runs every pending transition of `plan`.
    ///
    /// Never returns early with an error: every failure ends up in the
    /// result, and every call publishes exactly one completion event per
    /// registered notifier.
    pub async fn execute<S, R>(
        &self,
        plan: &MigrationPlan<S>,
        store: &S,
        state_store: &R,
    ) -> ExecutionResult
    where
        S: TransactionalStore,
        R: StateStore + ?Sized,
    {
        let span = info_span!("plan_execution", plan = plan.name());
        let result = self
            .run(plan, store, state_store)
            .instrument(span)
            .await
            .finish();
        self.publish(&result);
        result
    }

    /// Reports the persisted position of `plan` and what is left to run.
    pub async fn status<S, R>(&self, plan: &MigrationPlan<S>, state_store: &R) -> Result<PlanStatus>
    where
        S: TransactionalStore,
        R: StateStore + ?Sized,
    {
        plan.validate()
            .map_err(|source| MigrationError::plan_integrity(plan.name(), source))?;

        let current_state = self
            .current_state(plan, &self.state_key(plan), state_store)
            .await?;
        let pending = plan
            .pending_from(&current_state)
            .map_err(|source| MigrationError::plan_integrity(plan.name(), source))?;

        Ok(PlanStatus {
            plan_name: plan.name().to_string(),
            current_state,
            final_state: plan.final_state().to_string(),
            pending,
        })
    }

    async fn run<S, R>(&self, plan: &MigrationPlan<S>, store: &S, state_store: &R) -> ExecutionResult
    where
        S: TransactionalStore,
        R: StateStore + ?Sized,
    {
        let mut result = ExecutionResult::begin(plan.name(), plan.initial_state());

        if let Err(source) = plan.validate() {
            event!(Level::ERROR, error = %source, "plan failed validation");
            result.fail(MigrationError::plan_integrity(plan.name(), source));
            return result;
        }

        let key = self.state_key(plan);
        let current = match self.current_state(plan, &key, state_store).await {
            Ok(state) => state,
            Err(err) => {
                event!(Level::ERROR, key = key.as_str(), error = %err, "failed to read plan state");
                result.fail(err);
                return result;
            }
        };
        result.resume_at(&current);

        let path = match plan.follow_path(&current, None) {
            Ok(path) => path,
            Err(source) => {
                event!(Level::ERROR, state = current.as_str(), error = %source, "persisted state is not on the plan");
                result.fail(MigrationError::plan_integrity(plan.name(), source));
                return result;
            }
        };

        if path.is_empty() {
            event!(Level::DEBUG, state = current.as_str(), "plan already at final state");
            return result;
        }

        event!(
            Level::INFO,
            from = current.as_str(),
            to = plan.final_state(),
            pending = path.len(),
            "executing plan"
        );

        for transition in path {
            match self
                .run_transition(plan, transition, store, state_store, &key)
                .await
            {
                Ok(record) => result.record(record),
                Err(err) => {
                    event!(
                        Level::ERROR,
                        from = transition.from_state(),
                        to = transition.to_state(),
                        error = %err,
                        "transition failed; plan stopped"
                    );
                    result.fail(err);
                    break;
                }
            }
        }

        result
    }

    async fn current_state<S, R>(
        &self,
        plan: &MigrationPlan<S>,
        key: &str,
        state_store: &R,
    ) -> Result<String>
    where
        S: TransactionalStore,
        R: StateStore + ?Sized,
    {
        if plan.ignores_current_state() {
            return Ok(plan.initial_state().to_string());
        }

        let persisted = state_store.get(key).await.map_err(as_state_store_error)?;
        Ok(persisted.unwrap_or_else(|| plan.initial_state().to_string()))
    }

    async fn run_transition<S, R>(
        &self,
        plan: &MigrationPlan<S>,
        transition: &Transition<S>,
        store: &S,
        state_store: &R,
        key: &str,
    ) -> Result<TransitionRecord>
    where
        S: TransactionalStore,
        R: StateStore + ?Sized,
    {
        let started = Instant::now();
        event!(
            Level::INFO,
            from = transition.from_state(),
            to = transition.to_state(),
            step = transition.step_name(),
            "executing transition"
        );

        let mut tx = store.begin().await?;

        if let Err(source) = transition.step().execute(&mut tx).await {
            if let Err(rollback_err) = store.rollback(tx).await {
                event!(Level::WARN, error = %rollback_err, "rollback of failed transition reported an error");
            }
            return Err(MigrationError::TransitionExecution {
                plan: plan.name().to_string(),
                from: transition.from_state().to_string(),
                to: transition.to_state().to_string(),
                source,
            });
        }

        let staged = if shares_backing(store, state_store) {
            match store.stage_marker(&mut tx, key, transition.to_state()).await {
                Ok(staged) => staged,
                Err(err) => {
                    if let Err(rollback_err) = store.rollback(tx).await {
                        event!(Level::WARN, error = %rollback_err, "rollback after failed marker staging reported an error");
                    }
                    return Err(as_state_store_error(err));
                }
            }
        } else {
            false
        };

        store.commit(tx).await?;
        if !staged {
            state_store
                .set(key, transition.to_state())
                .await
                .map_err(as_state_store_error)?;
        }

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        match self.config.slow_transition_threshold() {
            Some(threshold) if elapsed > threshold => event!(
                Level::WARN,
                to = transition.to_state(),
                elapsed_ms,
                threshold_ms = threshold.as_millis() as u64,
                "slow transition"
            ),
            _ => event!(
                Level::INFO,
                to = transition.to_state(),
                elapsed_ms,
                "transition completed"
            ),
        }

        Ok(TransitionRecord {
            from: transition.from_state().to_string(),
            to: transition.to_state().to_string(),
            step: transition.step_name().to_string(),
            elapsed,
        })
    }

    fn publish(&self, result: &ExecutionResult) {
        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(result) {
                event!(
                    Level::WARN,
                    plan = result.plan_name(),
                    error = %err,
                    "completion notifier failed"
                );
            }
        }
    }
}

/// Whether the state store is the data store itself, so markers can ride
/// on the step's own transaction.
fn shares_backing<S, R>(store: &S, state_store: &R) -> bool
where
    S: TransactionalStore,
    R: StateStore + ?Sized,
{
    std::ptr::addr_eq(store as *const S, state_store as *const R)
}

fn as_state_store_error(err: MigrationError) -> MigrationError {
    match err {
        MigrationError::StateStore(_) => err,
        other => MigrationError::StateStore(other.to_string()),
    }
}
