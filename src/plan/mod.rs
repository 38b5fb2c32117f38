//! Migration plans: a named, linear chain of state transitions.
//!
//! ```text
//! ""  ──CreateTable──>  "a"  ──Backfill──>  "b"  ──AddColumn──>  "c"
//! ^ initial state                                                ^ final state
//! ```
//!
//! The persisted marker of a plan is always one of the states on its chain;
//! the executor resumes from whichever state the marker names.

mod registry;
mod transition;
mod validation;

pub use registry::{StepFactory, StepRegistry};
pub use transition::{FnStep, NoopStep, StepFn, Transition, TransitionStep};

use crate::core::PlanIntegrityError;
use crate::state::state_key;
use crate::storage::TransactionalStore;
use std::fmt;
use std::sync::Arc;

pub type PlanResult<T> = std::result::Result<T, PlanIntegrityError>;

pub struct MigrationPlan<S: TransactionalStore> {
    name: String,
    initial_state: String,
    transitions: Vec<Transition<S>>,
    ignore_current_state: bool,
    /// State the next `to` call chains from.
    cursor: String,
}

impl<S: TransactionalStore> MigrationPlan<S> {
    /// Creates an empty plan starting at the empty state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_state: String::new(),
            transitions: Vec::new(),
            ignore_current_state: false,
            cursor: String::new(),
        }
    }

    /// Sets the state the chain continues from.
    ///
    /// Before the first transition this is the plan's initial state. Called
    /// later it starts a detached segment, which `validate` rejects.
    pub fn from(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        if self.transitions.is_empty() {
            self.initial_state = state.clone();
        }
        self.cursor = state;
        self
    }

    /// Appends a transition from the current end of the chain to `state`.
    pub fn to<T>(self, state: impl Into<String>, step: T) -> Self
    where
        T: TransitionStep<S> + 'static,
    {
        self.to_step(state, Arc::new(step))
    }

    pub fn to_step(mut self, state: impl Into<String>, step: Arc<dyn TransitionStep<S>>) -> Self {
        let state = state.into();
        let from = std::mem::replace(&mut self.cursor, state.clone());
        self.transitions.push(Transition::new(from, state, step));
        self
    }

    /// Appends a transition backed by a closure, named after its target.
    pub fn to_fn<F>(self, state: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut S::Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let state = state.into();
        let step = FnStep::<S>::new(format!("to {}", state), f);
        self.to(state, step)
    }

    /// Appends an explicit edge; used when plans are generated.
    pub fn add_transition(&mut self, transition: Transition<S>) {
        self.cursor = transition.to.clone();
        self.transitions.push(transition);
    }

    /// Replays the whole chain regardless of the persisted marker.
    pub fn ignore_current_state(mut self, ignore: bool) -> Self {
        self.ignore_current_state = ignore;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub fn transitions(&self) -> &[Transition<S>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn ignores_current_state(&self) -> bool {
        self.ignore_current_state
    }

    /// The last state of the chain, or the initial state of an empty plan.
    pub fn final_state(&self) -> &str {
        self.transitions
            .last()
            .map(|t| t.to.as_str())
            .unwrap_or(&self.initial_state)
    }

    /// Marker key of this plan under `prefix`.
    pub fn state_key(&self, prefix: &str) -> String {
        state_key(prefix, &self.name)
    }

    /// States in chain order, starting with the initial state.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.initial_state.as_str())
            .chain(self.transitions.iter().map(|t| t.to.as_str()))
    }

    pub fn contains_state(&self, state: &str) -> bool {
        self.states().any(|s| s == state)
    }

    pub fn transition_from(&self, state: &str) -> Option<&Transition<S>> {
        self.transitions.iter().find(|t| t.from == state)
    }

    /// Transitions leading from `from` to `to` (the final state when `None`).
    ///
    /// Assumes a validated chain.
    pub fn follow_path(&self, from: &str, to: Option<&str>) -> PlanResult<Vec<&Transition<S>>> {
        let target = to.unwrap_or_else(|| self.final_state());

        let start = self
            .states()
            .position(|s| s == from)
            .ok_or_else(|| PlanIntegrityError::UnknownState(from.to_string()))?;

        if from == target {
            return Ok(Vec::new());
        }

        let mut path = Vec::new();
        for transition in &self.transitions[start..] {
            path.push(transition);
            if transition.to == target {
                return Ok(path);
            }
        }

        Err(PlanIntegrityError::UnreachableTarget {
            from: from.to_string(),
            to: target.to_string(),
        })
    }

    /// Labels that still have to run when the plan is at `state`.
    pub fn pending_from(&self, state: &str) -> PlanResult<Vec<String>> {
        Ok(self
            .follow_path(state, None)?
            .into_iter()
            .map(|t| t.to.clone())
            .collect())
    }
}

impl<S: TransactionalStore> Clone for MigrationPlan<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            initial_state: self.initial_state.clone(),
            transitions: self.transitions.clone(),
            ignore_current_state: self.ignore_current_state,
            cursor: self.cursor.clone(),
        }
    }
}

impl<S: TransactionalStore> fmt::Debug for MigrationPlan<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationPlan")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("transitions", &self.transitions)
            .field("ignore_current_state", &self.ignore_current_state)
            .finish()
    }
}
