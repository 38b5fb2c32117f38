use crate::core::{MigrationError, Result};
use crate::state::DEFAULT_STATE_KEY_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Executor configuration
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```json
/// { "state_key_prefix": "upgrader:", "slow_transition_warn_ms": 5000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Prepended to the plan name to form the marker key.
    pub state_key_prefix: String,

    /// Transitions running longer than this are logged at WARN level.
    pub slow_transition_warn_ms: Option<u64>,

    /// Register a [`LogNotifier`](crate::notify::LogNotifier) on construction.
    pub log_completion: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            state_key_prefix: DEFAULT_STATE_KEY_PREFIX.to_string(),
            slow_transition_warn_ms: None,
            log_completion: true,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the marker key prefix
    pub fn with_state_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.state_key_prefix = prefix.into();
        self
    }

    /// Warn about transitions slower than `threshold`
    pub fn with_slow_transition_warning(mut self, threshold: Duration) -> Self {
        self.slow_transition_warn_ms = Some(threshold.as_millis() as u64);
        self
    }

    /// Enable or disable the built-in log notifier
    pub fn with_log_completion(mut self, enabled: bool) -> Self {
        self.log_completion = enabled;
        self
    }

    pub fn slow_transition_threshold(&self) -> Option<Duration> {
        self.slow_transition_warn_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_key_prefix.chars().any(char::is_control) {
            return Err(MigrationError::Config(
                "state_key_prefix must not contain control characters".to_string(),
            ));
        }
        if self.slow_transition_warn_ms == Some(0) {
            return Err(MigrationError::Config(
                "slow_transition_warn_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MigrationError::Config(format!("Invalid executor config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
