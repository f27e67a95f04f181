//! MCP Tool Types
//!
//! This module defines all MCP tool parameter and response types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use godmode_mcp_core::{HistoryRecord, Job, JobState, JobSummary};

// =============================================================================
// Job Management Tools
// =============================================================================

/// Parameters for start
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartParams {
    /// Shell command to run in the background (e.g., "npm run build", "sleep 10")
    pub command: String,

    /// Working directory (defaults to the server's working directory)
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Response for start
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStartResponse {
    /// Identifier to pass to check_status and stop
    pub job_id: String,

    /// Command as submitted
    pub command: String,

    /// State right after registration (normally "pending" or "running")
    pub state: JobState,

    /// Human-readable message
    pub message: String,
}

/// Parameters for check_status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckStatusParams {
    /// Job identifier returned by start
    pub job_id: String,

    /// Number of trailing output lines to return (0 = all captured output)
    #[serde(default)]
    pub lines: Option<usize>,

    /// Wait up to this many milliseconds for the job to finish before answering
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

/// Response for check_status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusResponse {
    /// Job identifier
    pub job_id: String,

    /// Command being run
    pub command: String,

    /// Working directory, if one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Current lifecycle state
    pub state: JobState,

    /// Exit code (set once the job is terminal)
    pub exit_code: Option<i32>,

    /// When the job was registered
    pub created_at: DateTime<Utc>,

    /// When the process was launched
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached its terminal state
    pub ended_at: Option<DateTime<Utc>>,

    /// Milliseconds spent running so far
    pub runtime_ms: Option<i64>,

    /// Whether a stop has been requested
    pub stop_requested: bool,

    /// Tail of the captured stdout/stderr
    pub output: String,

    /// Bytes of early output discarded by the buffer bound
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub output_dropped_bytes: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl JobStatusResponse {
    /// Build a status response from a job snapshot, keeping the last `lines` lines.
    pub fn from_job(job: &Job, lines: usize) -> Self {
        Self {
            job_id: job.id.to_string(),
            command: job.command.clone(),
            cwd: job.cwd.clone(),
            state: job.state,
            exit_code: job.exit_code,
            created_at: job.created_at,
            started_at: job.started_at,
            ended_at: job.ended_at,
            runtime_ms: job.runtime_ms(Utc::now()),
            stop_requested: job.stop_requested,
            output: job.output_tail(lines),
            output_dropped_bytes: job.output_dropped_bytes,
        }
    }
}

/// Parameters for stop
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StopParams {
    /// Job identifier returned by start
    pub job_id: String,
}

/// Response for stop
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StopResponse {
    /// Job identifier
    pub job_id: String,

    /// "stop_requested" or "already_terminal"
    pub outcome: String,

    /// State at the time of the request
    pub state: JobState,

    /// Human-readable message
    pub message: String,
}

/// Parameters for list_jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListJobsParams {}

/// Response for list_jobs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobListResponse {
    /// All tracked jobs in creation order
    pub jobs: Vec<JobSummary>,

    /// Number of jobs
    pub count: usize,
}

// =============================================================================
// History Tools
// =============================================================================

/// Parameters for read_global_history
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReadHistoryParams {
    /// Only return the most recent N records
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response for read_global_history
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryResponse {
    /// Finished jobs, oldest first
    pub records: Vec<HistoryRecord>,

    /// Number of records returned
    pub count: usize,
}

// =============================================================================
// Combined Tool
// =============================================================================

/// Action selector for process_manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAction {
    /// Launch a command (requires `command`)
    Start,
    /// Inspect a job (requires `job_id`)
    CheckStatus,
    /// Stop a job (requires `job_id`)
    Stop,
    /// List all jobs
    ListJobs,
    /// Read the finished-job history
    ReadGlobalHistory,
}

/// Parameters for process_manager
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessManagerParams {
    /// Which operation to perform
    pub action: ProcessAction,

    /// Command to run (start)
    #[serde(default)]
    pub command: Option<String>,

    /// Working directory (start)
    #[serde(default)]
    pub cwd: Option<String>,

    /// Job identifier (check_status, stop)
    #[serde(default)]
    pub job_id: Option<String>,

    /// Trailing output lines (check_status)
    #[serde(default)]
    pub lines: Option<usize>,

    /// Wait for completion in milliseconds (check_status)
    #[serde(default)]
    pub wait_ms: Option<u64>,

    /// Most recent N records (read_global_history)
    #[serde(default)]
    pub limit: Option<usize>,
}
