mod config;
mod executor;

pub use config::ExecutorConfig;
pub use executor::{PlanExecutor, PlanStatus};
