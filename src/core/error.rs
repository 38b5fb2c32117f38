use thiserror::Error;

/// Structural defects of a migration plan.
///
/// These are fatal: re-running the same plan will fail the same way until
/// the plan itself is fixed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanIntegrityError {
    #[error("Plan name must not be empty")]
    EmptyPlanName,

    #[error("Transition #{index} has an empty target state")]
    EmptyTargetState { index: usize },

    #[error("Transition #{index} starts at '{found}' but the chain is at '{expected}'")]
    BrokenChain {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Target state '{0}' appears more than once in the plan")]
    DuplicateTargetState(String),

    #[error("State '{0}' is not part of the plan")]
    UnknownState(String),

    #[error("State '{to}' cannot be reached from '{from}'")]
    UnreachableTarget { from: String, to: String },

    #[error("No step registered under '{0}'")]
    UnknownStep(String),
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Plan '{plan}' is inconsistent: {source}")]
    PlanIntegrity {
        plan: String,
        #[source]
        source: PlanIntegrityError,
    },

    #[error("Transition '{from}' -> '{to}' of plan '{plan}' failed: {source}")]
    TransitionExecution {
        plan: String,
        from: String,
        to: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' already exists in table '{1}'")]
    ColumnExists(String, String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    pub fn plan_integrity(plan: impl Into<String>, source: PlanIntegrityError) -> Self {
        Self::PlanIntegrity {
            plan: plan.into(),
            source,
        }
    }

    pub fn is_plan_integrity(&self) -> bool {
        matches!(self, Self::PlanIntegrity { .. })
    }

    pub fn is_transition_failure(&self) -> bool {
        matches!(self, Self::TransitionExecution { .. })
    }

    pub fn is_state_store(&self) -> bool {
        matches!(self, Self::StateStore(_))
    }

    /// Whether re-invoking the plan after fixing the cause can make progress.
    ///
    /// Integrity and state-store failures need the plan or the environment
    /// repaired first; a failed step or a lost commit race only needs a rerun.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransitionExecution { .. } | Self::Conflict(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for MigrationError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
