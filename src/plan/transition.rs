use crate::storage::TransactionalStore;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// One unit of migration work, run inside a single store transaction.
///
/// Returning an error rolls the transaction back and stops the plan; the
/// error is reported to the caller as the cause of the failed transition.
///
/// # Idempotence
///
/// The executor runs a step at most once per successful plan run, but a
/// step may run again when a plan is replayed with
/// `ignore_current_state`, or when the marker lives in a separate state
/// store and the process dies after the step's transaction committed but
/// before the marker was written. Steps must
/// therefore tolerate finding their target already in place (for example
/// by checking `has_table` before creating one) and succeed as a no-op.
#[async_trait]
pub trait TransitionStep<S: TransactionalStore>: Send + Sync {
    /// Name used in logs and transition records.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    async fn execute(&self, tx: &mut S::Transaction) -> anyhow::Result<()>;
}

pub type StepFn<S> =
    Arc<dyn Fn(&mut <S as TransactionalStore>::Transaction) -> anyhow::Result<()> + Send + Sync>;

/// A step backed by a synchronous closure.
pub struct FnStep<S: TransactionalStore> {
    name: String,
    f: StepFn<S>,
}

impl<S: TransactionalStore> FnStep<S> {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut S::Transaction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

impl<S: TransactionalStore> Clone for FnStep<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            f: Arc::clone(&self.f),
        }
    }
}

#[async_trait]
impl<S: TransactionalStore> TransitionStep<S> for FnStep<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, tx: &mut S::Transaction) -> anyhow::Result<()> {
        (self.f)(tx)
    }
}

/// A step that does nothing; used to move a plan's marker without work.
pub struct NoopStep;

#[async_trait]
impl<S: TransactionalStore> TransitionStep<S> for NoopStep {
    fn name(&self) -> &str {
        "NoopStep"
    }

    async fn execute(&self, _tx: &mut S::Transaction) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An edge of the plan chain: `from` -> `to` by running `step`.
pub struct Transition<S: TransactionalStore> {
    pub(crate) from: String,
    pub(crate) to: String,
    pub(crate) step: Arc<dyn TransitionStep<S>>,
}

impl<S: TransactionalStore> Transition<S> {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        step: Arc<dyn TransitionStep<S>>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            step,
        }
    }

    pub fn from_state(&self) -> &str {
        &self.from
    }

    pub fn to_state(&self) -> &str {
        &self.to
    }

    pub fn step(&self) -> &Arc<dyn TransitionStep<S>> {
        &self.step
    }

    pub fn step_name(&self) -> &str {
        self.step.name()
    }
}

impl<S: TransactionalStore> Clone for Transition<S> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            step: Arc::clone(&self.step),
        }
    }
}

impl<S: TransactionalStore> fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("step", &self.step.name())
            .finish()
    }
}

impl<S: TransactionalStore> fmt::Display for Transition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' -> '{}' ({})", self.from, self.to, self.step.name())
    }
}
