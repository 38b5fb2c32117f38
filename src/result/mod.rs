mod result;

pub use result::{ExecutionResult, PlanExecuted, TransitionRecord};
