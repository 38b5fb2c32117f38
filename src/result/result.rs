use crate::core::{MigrationError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A transition that committed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: String,
    pub to: String,
    pub step: String,
    pub elapsed: Duration,
}

/// Outcome of one `PlanExecutor::execute` call.
///
/// `final_state` always equals the persisted marker after the run (or the
/// initial state when nothing committed), and `completed_transitions` lists
/// only the targets reached by this call, never earlier runs.
#[derive(Debug)]
pub struct ExecutionResult {
    run_id: Uuid,
    plan_name: String,
    initial_state: String,
    final_state: String,
    transitions: Vec<TransitionRecord>,
    error: Option<MigrationError>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub(crate) fn begin(plan_name: &str, initial_state: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            plan_name: plan_name.to_string(),
            initial_state: initial_state.to_string(),
            final_state: initial_state.to_string(),
            transitions: Vec::new(),
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Resets the starting point once the persisted marker is known.
    pub(crate) fn resume_at(&mut self, state: &str) {
        self.initial_state = state.to_string();
        self.final_state = state.to_string();
    }

    pub(crate) fn record(&mut self, record: TransitionRecord) {
        self.final_state = record.to.clone();
        self.transitions.push(record);
    }

    pub(crate) fn fail(&mut self, error: MigrationError) {
        self.error = Some(error);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub fn final_state(&self) -> &str {
        &self.final_state
    }

    /// Target labels of the transitions run by this call, in order.
    pub fn completed_transitions(&self) -> Vec<&str> {
        self.transitions.iter().map(|t| t.to.as_str()).collect()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn successful(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&MigrationError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Completion event payload for notifiers.
    pub fn event(&self) -> PlanExecuted {
        PlanExecuted {
            run_id: self.run_id,
            plan_name: self.plan_name.clone(),
            initial_state: self.initial_state.clone(),
            final_state: self.final_state.clone(),
            successful: self.successful(),
            completed_transition_count: self.transitions.len(),
            exception_summary: self.error.as_ref().map(|e| e.to_string()),
            finished_at: self.finished_at,
        }
    }

    /// Turns a failed run into its error, for callers using `?`.
    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Serializable summary published once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanExecuted {
    pub run_id: Uuid,
    pub plan_name: String,
    pub initial_state: String,
    pub final_state: String,
    pub successful: bool,
    pub completed_transition_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_summary: Option<String>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: &str, to: &str) -> TransitionRecord {
        TransitionRecord {
            from: from.into(),
            to: to.into(),
            step: "step".into(),
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_records_advance_final_state() {
        let mut result = ExecutionResult::begin("p", "");
        result.record(record("", "a"));
        result.record(record("a", "b"));
        let result = result.finish();

        assert_eq!(result.initial_state(), "");
        assert_eq!(result.final_state(), "b");
        assert_eq!(result.completed_transitions(), vec!["a", "b"]);
        assert!(result.successful());
        assert!(result.finished_at() >= result.started_at());
    }

    #[test]
    fn test_event_carries_failure_summary() {
        let mut result = ExecutionResult::begin("p", "a");
        result.fail(MigrationError::StateStore("unreachable".into()));
        let event = result.finish().event();

        assert!(!event.successful);
        assert_eq!(event.completed_transition_count, 0);
        assert_eq!(
            event.exception_summary.as_deref(),
            Some("State store error: unreachable")
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["plan_name"], "p");
        assert_eq!(json["final_state"], "a");
    }

    #[test]
    fn test_into_result() {
        let ok = ExecutionResult::begin("p", "").finish();
        assert!(ok.into_result().is_ok());

        let mut failed = ExecutionResult::begin("p", "");
        failed.fail(MigrationError::Store("down".into()));
        assert!(matches!(
            failed.finish().into_result(),
            Err(MigrationError::Store(_))
        ));
    }
}
