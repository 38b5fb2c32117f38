//! Durable progress markers.
//!
//! A plan's progress is one string per plan: the label of the last state
//! whose transition committed. An absent key means the plan never ran.

pub mod file;

pub use file::FileStateStore;

use crate::core::Result;
use async_trait::async_trait;

/// Prefix used for marker keys unless configured otherwise.
pub const DEFAULT_STATE_KEY_PREFIX: &str = "plan:";

/// Durable key-value slot holding the completed state of each plan.
///
/// Implementations must make a value durable before `set` returns, and a
/// value written by `set` must be returned by every later `get`, including
/// from other processes sharing the same backing storage.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Marker key for `plan_name` under `prefix`.
pub fn state_key(prefix: &str, plan_name: &str) -> String {
    format!("{}{}", prefix, plan_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_key_layout() {
        assert_eq!(state_key(DEFAULT_STATE_KEY_PREFIX, "core"), "plan:core");
        assert_eq!(state_key("", "core"), "core");
    }
}
