//! Engine and batch job configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FlowError, Result};

// ============================================================================
// Engine Configuration Constants
// ============================================================================

/// Default number of document URIs fetched per page.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of documents processed concurrently.
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Consecutive store-unavailable document errors that fail the job.
pub const DEFAULT_WRITE_FAILURE_THRESHOLD: u32 = 5;

/// Listener callbacks slower than this are reported at warn level.
pub const DEFAULT_LISTENER_WARN_AFTER_MS: u64 = 250;

/// Operation budget for a single Rhai stage invocation.
pub const DEFAULT_SCRIPT_MAX_OPERATIONS: u64 = 1_000_000;

/// Parameters of one batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Page size used when fetching URIs from the document source
    pub batch_size: usize,
    /// Maximum number of documents in flight at once
    pub thread_count: usize,
}

impl BatchConfig {
    /// Create a validated batch configuration
    pub fn new(batch_size: usize, thread_count: usize) -> Result<Self> {
        let config = Self {
            batch_size,
            thread_count,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FlowError::config("batch size must be at least 1"));
        }
        if self.thread_count == 0 {
            return Err(FlowError::config("thread count must be at least 1"));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            thread_count: DEFAULT_THREAD_COUNT,
        }
    }
}

/// Settings shared by every job a coordinator runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Consecutive store-unavailable errors on document reads or writes
    /// after which the job is failed instead of continuing
    pub write_failure_threshold: u32,
    pub listener_warn_after_ms: u64,
    pub script_max_operations: u64,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.write_failure_threshold == 0 {
            return Err(FlowError::config("write failure threshold must be at least 1"));
        }
        Ok(())
    }

    pub fn listener_warn_after(&self) -> Duration {
        Duration::from_millis(self.listener_warn_after_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_failure_threshold: DEFAULT_WRITE_FAILURE_THRESHOLD,
            listener_warn_after_ms: DEFAULT_LISTENER_WARN_AFTER_MS,
            script_max_operations: DEFAULT_SCRIPT_MAX_OPERATIONS,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_rejects_zero() {
        assert!(BatchConfig::new(0, 1).is_err());
        assert!(BatchConfig::new(1, 0).is_err());
        let config = BatchConfig::new(10, 1).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.thread_count, 1);
    }

    #[test]
    fn test_engine_config_from_partial_toml() {
        let config: EngineConfig = toml::from_str("write_failure_threshold = 2").unwrap();
        assert_eq!(config.write_failure_threshold, 2);
        assert_eq!(config.script_max_operations, DEFAULT_SCRIPT_MAX_OPERATIONS);
        assert!(config.validate().is_ok());

        let zero = EngineConfig {
            write_failure_threshold: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(zero.validate(), Err(FlowError::Configuration(_))));
    }
}
