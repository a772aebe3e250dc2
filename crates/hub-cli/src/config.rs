//! Configuration management for the hub CLI
//!
//! Sources, lowest precedence first: built-in defaults, `<project>/hub.toml`,
//! `HUB_*` environment variables (a `.env` file is honoured), command-line
//! flags.

use hub_flow::config::{DEFAULT_BATCH_SIZE, DEFAULT_THREAD_COUNT};
use hub_flow::{EngineConfig, FlowType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CliError, Result};

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "hub.toml";

/// Default directory of raw documents read by INPUT flows.
pub const DEFAULT_INPUT_DIR: &str = "input";

/// Default staging database directory.
pub const DEFAULT_STAGING_DIR: &str = "data/staging";

/// Default final database directory.
pub const DEFAULT_FINAL_DIR: &str = "data/final";

/// Hub CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Project root holding `plugins/entities`
    #[serde(skip)]
    pub project_dir: PathBuf,

    /// Raw documents read by INPUT flows
    pub input_dir: PathBuf,

    /// Written by INPUT flows, read by HARMONIZE flows
    pub staging_dir: PathBuf,

    /// Written by HARMONIZE flows
    pub final_dir: PathBuf,

    pub batch_size: usize,
    pub thread_count: usize,

    /// Give up waiting for a job after this many seconds
    pub wait_timeout_secs: Option<u64>,

    /// `[engine]` table: store-failure threshold, listener and script limits
    pub engine: EngineConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            final_dir: PathBuf::from(DEFAULT_FINAL_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            thread_count: DEFAULT_THREAD_COUNT,
            wait_timeout_secs: None,
            engine: EngineConfig::default(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub batch_size: Option<usize>,
    pub thread_count: Option<usize>,
    pub wait_timeout_secs: Option<u64>,
}

impl HubConfig {
    /// Load configuration for a project. `project_dir` falls back to
    /// `HUB_PROJECT_DIR`, then the current directory.
    pub fn load(project_dir: Option<PathBuf>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let project_dir = project_dir
            .or_else(|| std::env::var("HUB_PROJECT_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::from_file(&project_dir.join(CONFIG_FILE))?;
        config.project_dir = project_dir;
        config.merge_env()?;
        Ok(config)
    }

    /// Read a config file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Override fields with any `HUB_*` variables that are set
    pub fn merge_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("HUB_INPUT_DIR") {
            self.input_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("HUB_STAGING_DIR") {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("HUB_FINAL_DIR") {
            self.final_dir = PathBuf::from(dir);
        }
        if let Some(size) = env_number("HUB_BATCH_SIZE")? {
            self.batch_size = size;
        }
        if let Some(count) = env_number("HUB_THREAD_COUNT")? {
            self.thread_count = count;
        }
        if let Some(threshold) = env_number("HUB_WRITE_FAILURE_THRESHOLD")? {
            self.engine.write_failure_threshold = threshold;
        }
        if let Some(secs) = env_number("HUB_WAIT_TIMEOUT_SECS")? {
            self.wait_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(size) = overrides.batch_size {
            self.batch_size = size;
        }
        if let Some(count) = overrides.thread_count {
            self.thread_count = count;
        }
        if let Some(secs) = overrides.wait_timeout_secs {
            self.wait_timeout_secs = Some(secs);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CliError::config("batch_size must be at least 1"));
        }
        if self.thread_count == 0 {
            return Err(CliError::config("thread_count must be at least 1"));
        }
        self.engine_config()
            .validate()
            .map_err(|e| CliError::config(e.to_string()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.engine.clone()
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve a configured directory against the project directory
    pub fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.project_dir.join(dir)
        }
    }

    /// Directories a flow of this type reads from and writes to
    pub fn stores_for(&self, flow_type: FlowType) -> (PathBuf, PathBuf) {
        match flow_type {
            FlowType::Input => (self.resolve(&self.input_dir), self.resolve(&self.staging_dir)),
            FlowType::Harmonize => (self.resolve(&self.staging_dir), self.resolve(&self.final_dir)),
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CliError::config(format!("{name} must be a non-negative integer, got '{value}'"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for name in [
            "HUB_PROJECT_DIR",
            "HUB_INPUT_DIR",
            "HUB_STAGING_DIR",
            "HUB_FINAL_DIR",
            "HUB_BATCH_SIZE",
            "HUB_THREAD_COUNT",
            "HUB_WRITE_FAILURE_THRESHOLD",
            "HUB_WAIT_TIMEOUT_SECS",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_file_then_env_then_flags() {
        clear_env();
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "batch_size = 50\nthread_count = 2\n\n[engine]\nlistener_warn_after_ms = 10\n",
        )
        .unwrap();

        std::env::set_var("HUB_THREAD_COUNT", "8");
        let mut config = HubConfig::load(Some(dir.path().to_path_buf())).unwrap();
        clear_env();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.thread_count, 8);
        assert_eq!(config.engine.listener_warn_after_ms, 10);

        config.apply(&Overrides {
            batch_size: Some(5),
            ..Overrides::default()
        });
        assert_eq!(config.batch_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_failure_threshold_read_from_engine_table() {
        clear_env();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[engine]\nwrite_failure_threshold = 2\n").unwrap();

        let config = HubConfig::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.engine_config().write_failure_threshold, 2);

        std::env::set_var("HUB_WRITE_FAILURE_THRESHOLD", "7");
        let config = HubConfig::load(Some(dir.path().to_path_buf())).unwrap();
        clear_env();
        assert_eq!(config.engine_config().write_failure_threshold, 7);
    }

    #[test]
    fn test_top_level_failure_threshold_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "write_failure_threshold = 2\n").unwrap();
        assert!(HubConfig::from_file(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_env_number() {
        clear_env();
        std::env::set_var("HUB_BATCH_SIZE", "lots");
        let result = HubConfig::default().merge_env();
        clear_env();
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_stores_follow_flow_type() {
        let config = HubConfig {
            project_dir: PathBuf::from("/p"),
            ..HubConfig::default()
        };
        assert_eq!(
            config.stores_for(FlowType::Input),
            (PathBuf::from("/p/input"), PathBuf::from("/p/data/staging"))
        );
        assert_eq!(
            config.stores_for(FlowType::Harmonize),
            (PathBuf::from("/p/data/staging"), PathBuf::from("/p/data/final"))
        );
    }

    #[test]
    fn test_zero_thread_count_rejected() {
        let config = HubConfig {
            thread_count: 0,
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
