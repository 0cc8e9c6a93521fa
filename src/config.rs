use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::MERGE_WINDOW;
use crate::util::time;

/// Default number of entries kept on the undo stack
pub const DEFAULT_MAX_HISTORY: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse history config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid history config: {0}")]
    Invalid(String),
}

/// Tunables for a [`crate::CommandManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Undo entries kept before the oldest are evicted
    pub max_history: usize,
    /// Whether adjacent compatible edits coalesce
    pub merge_enabled: bool,
    pub merge_window_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            merge_enabled: true,
            merge_window_ms: time::duration_millis(MERGE_WINDOW),
        }
    }
}

impl HistoryConfig {
    /// Parse a JSON document; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history == 0 {
            return Err(ConfigError::Invalid("max_history must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn merge_window(&self) -> Duration {
        Duration::from_millis(self.merge_window_ms)
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_merge_enabled(mut self, merge_enabled: bool) -> Self {
        self.merge_enabled = merge_enabled;
        self
    }

    pub fn with_merge_window(mut self, window: Duration) -> Self {
        self.merge_window_ms = time::duration_millis(window);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_history, 100);
        assert!(config.merge_enabled);
        assert_eq!(config.merge_window(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HistoryConfig::from_json(r#"{ "max_history": 20 }"#).unwrap();
        assert_eq!(config.max_history, 20);
        assert!(config.merge_enabled);
        assert_eq!(config.merge_window_ms, 300);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = HistoryConfig::from_json(r#"{ "max_history": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            HistoryConfig::from_json("{ max_history: }"),
            Err(ConfigError::Parse(_))
        ));
    }
}
