//! Audit records for finished jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobState, JobSummary};

/// Immutable record written once when a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryRecord {
    /// Job identifier
    pub id: JobId,
    /// Command line as submitted
    pub command: String,
    /// Final state (always terminal)
    pub state: JobState,
    /// Exit code of the job
    pub exit_code: Option<i32>,
    /// When the process was launched (unset if it never launched)
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached its terminal state
    pub ended_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Build a record from a terminal job.
    ///
    /// Returns `None` while the job is still pending or running.
    pub fn from_summary(job: &JobSummary) -> Option<Self> {
        if !job.state.is_terminal() {
            return None;
        }
        Some(Self {
            id: job.id.clone(),
            command: job.command.clone(),
            state: job.state,
            exit_code: job.exit_code,
            started_at: job.started_at,
            ended_at: job.ended_at?,
        })
    }

    /// Encode as a single JSON line (without trailing newline).
    pub fn to_json_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a single JSON line.
    pub fn from_json_line(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(state: JobState) -> JobSummary {
        let now = Utc::now();
        JobSummary {
            id: JobId::from("abcd1234"),
            command: "echo hello".to_string(),
            state,
            created_at: now,
            started_at: Some(now),
            ended_at: state.is_terminal().then_some(now),
            exit_code: state.is_terminal().then_some(0),
        }
    }

    #[test]
    fn test_record_from_terminal_job() {
        let record = HistoryRecord::from_summary(&job(JobState::Completed)).unwrap();
        assert_eq!(record.id.as_str(), "abcd1234");
        assert_eq!(record.command, "echo hello");
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.exit_code, Some(0));
    }

    #[test]
    fn test_no_record_for_running_job() {
        assert!(HistoryRecord::from_summary(&job(JobState::Running)).is_none());
        assert!(HistoryRecord::from_summary(&job(JobState::Pending)).is_none());
    }

    #[test]
    fn test_json_line() {
        let record = HistoryRecord::from_summary(&job(JobState::Stopped)).unwrap();
        let line = record.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"state\":\"stopped\""));
        assert_eq!(HistoryRecord::from_json_line(&line).unwrap(), record);
    }

    #[test]
    fn test_bad_json_line() {
        assert!(HistoryRecord::from_json_line("not json").is_err());
    }
}
