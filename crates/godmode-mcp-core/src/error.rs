//! Error types for the godmode MCP server.

use thiserror::Error;

use crate::{JobId, JobState};

/// Main error type for job management operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Job not found in the registry
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// State change rejected by the job lifecycle
    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        /// Job that rejected the transition
        id: JobId,
        /// State the job was in
        from: JobState,
        /// State that was requested
        to: JobState,
    },

    /// Job already reached a terminal state
    #[error("Job {0} already finished")]
    AlreadyTerminal(JobId),

    /// Command could not be launched
    #[error("Launch failure: {0}")]
    LaunchFailure(String),

    /// Too many active jobs
    #[error("Job limit reached (max active: {0})")]
    JobLimitReached(usize),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error means the referenced job does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::JobNotFound(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
