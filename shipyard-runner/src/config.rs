//! Runner configuration
//!
//! Defines the parameters that control how phase commands are executed:
//! working directory, artifact store location, concurrency, timeouts and
//! the environment handed to child processes.
//!
//! Core logic never reads the process environment; the CLI builds this
//! struct from flags and environment variables and passes it in.

use shipyard_core::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory phase commands run in; artifact directories are relative to it
    pub workdir: PathBuf,

    /// Root of the artifact store; each run gets a subdirectory
    pub artifact_dir: PathBuf,

    /// Overrides the definition's concurrency cap when set
    pub max_concurrency: Option<usize>,

    /// Timeout for phases that do not declare their own
    pub default_timeout: Duration,

    /// Tail of combined command output kept per result
    pub max_output_bytes: usize,

    /// Whether child processes inherit the orchestrator's environment
    pub inherit_env: bool,

    /// Extra environment variables for every command (e.g. credentials)
    pub env: HashMap<String, String>,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new(workdir: impl Into<PathBuf>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            artifact_dir: artifact_dir.into(),
            max_concurrency: None,
            default_timeout: Duration::from_secs(3600),
            max_output_bytes: 64 * 1024,
            inherit_env: true,
            env: HashMap::new(),
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Adds an environment variable passed to every command
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workdir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "workdir cannot be empty".to_string(),
            ));
        }

        if self.artifact_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "artifact_dir cannot be empty".to_string(),
            ));
        }

        if self.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidSetting(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.default_timeout.is_zero() {
            return Err(ConfigError::InvalidSetting(
                "default_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_output_bytes == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_output_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(".", ".shipyard/artifacts")
    }
}
