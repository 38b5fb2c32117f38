//! Completion notifications.
//!
//! The executor hands every finished [`ExecutionResult`] to each registered
//! notifier exactly once. A notifier error is logged by the executor and
//! otherwise ignored; it never changes the outcome of the run.

mod broadcast;

pub use broadcast::BroadcastNotifier;

use crate::core::{MigrationError, Result};
use crate::result::{ExecutionResult, PlanExecuted};
use std::sync::Mutex;
use tracing::{Level, event};

pub trait CompletionNotifier: Send + Sync {
    fn notify(&self, result: &ExecutionResult) -> Result<()>;
}

/// Emits one structured `tracing` event per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn notify(&self, result: &ExecutionResult) -> Result<()> {
        if result.successful() {
            event!(
                Level::INFO,
                run_id = %result.run_id(),
                plan = result.plan_name(),
                initial_state = result.initial_state(),
                final_state = result.final_state(),
                completed = result.transitions().len(),
                "plan executed"
            );
        } else {
            event!(
                Level::ERROR,
                run_id = %result.run_id(),
                plan = result.plan_name(),
                initial_state = result.initial_state(),
                final_state = result.final_state(),
                completed = result.transitions().len(),
                error = %result.error().map(|e| e.to_string()).unwrap_or_default(),
                "plan execution failed"
            );
        }
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<PlanExecuted>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlanExecuted> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CompletionNotifier for RecordingNotifier {
    fn notify(&self, result: &ExecutionResult) -> Result<()> {
        self.events
            .lock()
            .map_err(MigrationError::from)?
            .push(result.event());
        Ok(())
    }
}

impl<T: CompletionNotifier + ?Sized> CompletionNotifier for std::sync::Arc<T> {
    fn notify(&self, result: &ExecutionResult) -> Result<()> {
        (**self).notify(result)
    }
}
