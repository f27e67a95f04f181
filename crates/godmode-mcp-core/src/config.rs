//! Configuration types for the godmode MCP server.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Shell};

/// Server configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Server settings
    pub server: ServerSettings,
    /// Background job settings
    pub jobs: JobSettings,
    /// History log settings
    pub history: HistorySettings,
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.transport != "stdio" {
            return Err(Error::Config(format!(
                "unsupported transport '{}' (only stdio is available)",
                self.server.transport
            )));
        }

        if self.jobs.max_active_jobs == 0 {
            return Err(Error::Config("jobs.max_active_jobs must be > 0".into()));
        }

        if self.jobs.max_output_bytes == 0 {
            return Err(Error::Config("jobs.max_output_bytes must be > 0".into()));
        }

        if self.jobs.max_finished_jobs == Some(0) {
            return Err(Error::Config(
                "jobs.max_finished_jobs must be > 0 (omit it to keep all jobs)".into(),
            ));
        }

        if let Some(shell) = &self.jobs.shell {
            if shell.trim().is_empty() {
                return Err(Error::Config("jobs.shell cannot be empty".into()));
            }
        }

        if let Some(file) = &self.history.file {
            if file.as_os_str().is_empty() {
                return Err(Error::Config("history.file cannot be empty".into()));
            }
        }

        Ok(())
    }
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Transport type (stdio)
    pub transport: String,
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            transport: "stdio".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Background job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Shell used to run commands (None = auto-detect)
    pub shell: Option<String>,
    /// Maximum number of pending or running jobs
    pub max_active_jobs: usize,
    /// Output kept per job, in bytes
    pub max_output_bytes: usize,
    /// Lines of output returned by check_status when the caller does not ask
    pub default_tail_lines: usize,
    /// Time between SIGTERM and SIGKILL when stopping a job
    pub stop_grace_period_ms: u64,
    /// Time to wait for output pipes to close after the process exits
    pub output_drain_timeout_ms: u64,
    /// Number of finished jobs kept in the registry (None = keep all)
    pub max_finished_jobs: Option<usize>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            shell: None,
            max_active_jobs: 64,
            max_output_bytes: 1024 * 1024,
            default_tail_lines: 20,
            stop_grace_period_ms: 3000,
            output_drain_timeout_ms: 2000,
            max_finished_jobs: None,
        }
    }
}

impl JobSettings {
    /// Resolve the shell to launch commands with.
    pub fn resolved_shell(&self) -> Shell {
        Shell::resolve(self.shell.as_deref())
    }

    /// Stop grace period as a duration.
    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_millis(self.stop_grace_period_ms)
    }

    /// Output drain timeout as a duration.
    pub fn output_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.output_drain_timeout_ms)
    }
}

/// History log settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HistorySettings {
    /// JSON-lines file mirroring the history log (None = memory only)
    pub file: Option<PathBuf>,
}
