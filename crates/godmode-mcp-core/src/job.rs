//! Job types for background command tracking.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exit code recorded for a job whose command could not be launched at all.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

/// Length of the short hex identifiers handed out to clients.
const JOB_ID_LEN: usize = 8;

/// Unique identifier for a background job.
///
/// Rendered as a short lowercase hex string so clients can type it back
/// easily. Uniqueness within a registry is enforced by the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(JOB_ID_LEN);
        Self(simple)
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The last `lines` lines of `text`; `0` returns all of it.
pub fn tail_lines(text: &str, lines: usize) -> String {
    if lines == 0 {
        return text.to_string();
    }
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Lifecycle state of a job.
///
/// States only move forward: `Pending -> Running -> {Completed, Failed, Stopped}`,
/// plus `Pending -> Failed` when the command cannot be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Registered but not yet launched
    Pending,
    /// Process is running
    Running,
    /// Process exited with status zero
    Completed,
    /// Process exited non-zero or could not be launched
    Failed,
    /// Process was terminated by a stop request
    Stopped,
}

impl JobState {
    /// Whether no further transitions can happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Stopped
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Pending, JobState::Running) => true,
            (JobState::Pending, JobState::Failed) => true,
            (JobState::Running, s) => s.is_terminal(),
            _ => false,
        }
    }

    /// Lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job, including its captured output.
///
/// Snapshots are copies taken under the job's lock; state, timestamps and
/// exit code are always mutually consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Command line as submitted
    pub command: String,
    /// Working directory the command was started in, if one was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Current lifecycle state
    pub state: JobState,
    /// When the job was registered
    pub created_at: DateTime<Utc>,
    /// When the process was launched
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    /// Exit code, present only in terminal states
    pub exit_code: Option<i32>,
    /// Whether a stop was requested for this job
    pub stop_requested: bool,
    /// Captured stdout/stderr (lossy UTF-8)
    pub output: String,
    /// Bytes discarded from the head of the output by the buffer bound
    pub output_dropped_bytes: u64,
}

impl Job {
    /// Time spent running, in milliseconds.
    ///
    /// Measured up to `ended_at` for finished jobs, or up to `now` otherwise.
    pub fn runtime_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        let started = self.started_at?;
        let end = self.ended_at.unwrap_or(now);
        Some((end - started).num_milliseconds().max(0))
    }

    /// The last `lines` lines of captured output (`0` returns everything).
    pub fn output_tail(&self, lines: usize) -> String {
        tail_lines(&self.output, lines)
    }
}

/// Lightweight job description used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobSummary {
    /// Job identifier
    pub id: JobId,
    /// Command line as submitted
    pub command: String,
    /// Current lifecycle state
    pub state: JobState,
    /// When the job was registered
    pub created_at: DateTime<Utc>,
    /// When the process was launched
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    /// Exit code, present only in terminal states
    pub exit_code: Option<i32>,
}
