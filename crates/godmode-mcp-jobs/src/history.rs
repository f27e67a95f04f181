//! Append-only history of finished jobs.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use godmode_mcp_core::{HistoryRecord, HistorySettings, Result};

use crate::sync::lock;

/// Audit trail of terminal job outcomes, in the order they were appended.
///
/// Records live in memory for the lifetime of the process. When a file is
/// attached, each record is also written to it as one JSON line, and records
/// already in the file are loaded on open.
#[derive(Debug, Default)]
pub struct HistoryLog {
    inner: Mutex<HistoryInner>,
}

#[derive(Debug, Default)]
struct HistoryInner {
    records: Vec<HistoryRecord>,
    file: Option<HistoryFile>,
}

#[derive(Debug)]
struct HistoryFile {
    path: PathBuf,
    handle: File,
}

impl HistoryLog {
    /// Create a memory-only history log.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a history log mirrored to a JSON-lines file.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let records = if path.exists() {
            Self::load(&path)?
        } else {
            Vec::new()
        };

        let handle = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(
            "History log opened: path={}, {} existing record(s)",
            path.display(),
            records.len()
        );

        Ok(Self {
            inner: Mutex::new(HistoryInner {
                records,
                file: Some(HistoryFile { path, handle }),
            }),
        })
    }

    /// Build a history log from configuration.
    pub fn from_settings(settings: &HistorySettings) -> Result<Self> {
        match &settings.file {
            Some(path) => Self::with_file(path),
            None => Ok(Self::in_memory()),
        }
    }

    fn load(path: &Path) -> Result<Vec<HistoryRecord>> {
        let content = std::fs::read_to_string(path)?;
        let mut records = Vec::new();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match HistoryRecord::from_json_line(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable history line {} in {}: {}",
                    index + 1,
                    path.display(),
                    e
                ),
            }
        }

        Ok(records)
    }

    /// Append one record.
    ///
    /// File write failures are logged; the in-memory record is kept regardless.
    pub fn append(&self, record: HistoryRecord) {
        let mut inner = lock(&self.inner);

        if let Some(file) = inner.file.as_mut() {
            let written = record
                .to_json_line()
                .map_err(|e| e.to_string())
                .and_then(|line| {
                    writeln!(file.handle, "{line}")
                        .and_then(|_| file.handle.flush())
                        .map_err(|e| e.to_string())
                });
            if let Err(e) = written {
                warn!(
                    "Failed to write history record for job {} to {}: {}",
                    record.id,
                    file.path.display(),
                    e
                );
            }
        }

        debug!(
            "History record appended: id={}, state={}, exit_code={:?}",
            record.id, record.state, record.exit_code
        );
        inner.records.push(record);
    }

    /// All records in the order they were appended.
    pub fn read_all(&self) -> Vec<HistoryRecord> {
        lock(&self.inner).records.clone()
    }

    /// The most recent `n` records, oldest first.
    pub fn read_tail(&self, n: usize) -> Vec<HistoryRecord> {
        let inner = lock(&self.inner);
        let start = inner.records.len().saturating_sub(n);
        inner.records[start..].to_vec()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        lock(&self.inner).records.len()
    }

    /// Whether the log has no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the mirror file, if any.
    pub fn path(&self) -> Option<PathBuf> {
        lock(&self.inner).file.as_ref().map(|f| f.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use godmode_mcp_core::{JobId, JobState};

    fn record(id: &str, state: JobState, exit_code: i32) -> HistoryRecord {
        let now = Utc::now();
        HistoryRecord {
            id: JobId::from(id),
            command: format!("run {id}"),
            state,
            exit_code: Some(exit_code),
            started_at: Some(now),
            ended_at: now,
        }
    }

    #[test]
    fn test_in_memory_append_and_read() {
        let log = HistoryLog::in_memory();
        assert!(log.is_empty());

        log.append(record("a", JobState::Completed, 0));
        log.append(record("b", JobState::Failed, 2));
        log.append(record("c", JobState::Stopped, 143));

        let ids: Vec<String> = log.read_all().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(log.len(), 3);
        assert!(log.path().is_none());
    }

    #[test]
    fn test_read_tail() {
        let log = HistoryLog::in_memory();
        for i in 0..5 {
            log.append(record(&format!("job{i}"), JobState::Completed, 0));
        }

        let tail = log.read_tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].id.as_str(), "job3");
        assert_eq!(tail[1].id.as_str(), "job4");
        assert_eq!(log.read_tail(50).len(), 5);
        assert!(log.read_tail(0).is_empty());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");

        {
            let log = HistoryLog::with_file(&path).unwrap();
            log.append(record("first", JobState::Completed, 0));
            log.append(record("second", JobState::Failed, 1));
            assert_eq!(log.path(), Some(path.clone()));
        }

        let reopened = HistoryLog::with_file(&path).unwrap();
        let records = reopened.read_all();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_str(), "first");
        assert_eq!(records[1].state, JobState::Failed);

        reopened.append(record("third", JobState::Stopped, 137));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_file_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = record("good", JobState::Completed, 0).to_json_line().unwrap();
        std::fs::write(&path, format!("garbage\n\n{good}\n")).unwrap();

        let log = HistoryLog::with_file(&path).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.read_all()[0].id.as_str(), "good");
    }

    #[test]
    fn test_from_settings() {
        let log = HistoryLog::from_settings(&HistorySettings::default()).unwrap();
        assert!(log.path().is_none());

        let dir = tempfile::tempdir().unwrap();
        let settings = HistorySettings {
            file: Some(dir.path().join("h.jsonl")),
        };
        let log = HistoryLog::from_settings(&settings).unwrap();
        assert!(log.path().is_some());
    }
}
