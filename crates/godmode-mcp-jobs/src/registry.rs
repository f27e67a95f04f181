//! Job registry: the authoritative table of background jobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use godmode_mcp_core::{
    Error, HistoryRecord, Job, JobId, JobSettings, JobState, JobSummary, Result,
};

use crate::history::HistoryLog;
use crate::output::OutputBuffer;
use crate::sync::{lock, read, write};

/// Configuration for the job registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of pending or running jobs
    pub max_active_jobs: usize,

    /// Output kept per job, in bytes
    pub max_output_bytes: usize,

    /// Number of finished jobs to retain (None = keep all)
    pub max_finished_jobs: Option<usize>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::from(&JobSettings::default())
    }
}

impl From<&JobSettings> for RegistryConfig {
    fn from(settings: &JobSettings) -> Self {
        Self {
            max_active_jobs: settings.max_active_jobs,
            max_output_bytes: settings.max_output_bytes,
            max_finished_jobs: settings.max_finished_jobs,
        }
    }
}

/// Mutable state of one job, guarded by its own mutex.
#[derive(Debug)]
struct JobEntry {
    id: JobId,
    command: String,
    cwd: Option<String>,
    state: JobState,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
    stop_requested: bool,
    output: OutputBuffer,
}

impl JobEntry {
    /// Copy of the job with its output left as raw bytes.
    ///
    /// Decoding the output is deferred to [`render`] so it happens after the
    /// job's lock is released.
    fn snapshot(&self) -> (Job, Vec<u8>) {
        let job = Job {
            id: self.id.clone(),
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            exit_code: self.exit_code,
            stop_requested: self.stop_requested,
            output: String::new(),
            output_dropped_bytes: self.output.dropped_bytes(),
        };
        (job, self.output.as_bytes().to_vec())
    }

    fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            command: self.command.clone(),
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            exit_code: self.exit_code,
        }
    }
}

fn render((mut job, output): (Job, Vec<u8>)) -> Job {
    job.output = String::from_utf8_lossy(&output).into_owned();
    job
}

type SharedEntry = Arc<Mutex<JobEntry>>;

#[derive(Debug, Default)]
struct JobTable {
    entries: HashMap<JobId, SharedEntry>,
    /// Ids in creation order
    order: Vec<JobId>,
}

/// Registry of background jobs.
///
/// The table lock only guards the id → entry mapping; every state change or
/// output append takes the lock of the one job it touches. Lock order is
/// table → job → history, and nothing acquires them in reverse.
#[derive(Debug)]
pub struct JobRegistry {
    table: RwLock<JobTable>,
    history: Arc<HistoryLog>,
    active: AtomicUsize,
    config: RegistryConfig,
}

impl JobRegistry {
    /// Create a registry with default configuration and an in-memory history.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default(), Arc::new(HistoryLog::in_memory()))
    }

    /// Create a registry with custom configuration and history log.
    pub fn with_config(config: RegistryConfig, history: Arc<HistoryLog>) -> Self {
        Self {
            table: RwLock::new(JobTable::default()),
            history,
            active: AtomicUsize::new(0),
            config,
        }
    }

    /// The history log terminal transitions are written to.
    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }

    fn entry(&self, id: &JobId) -> Result<SharedEntry> {
        read(&self.table)
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(id.clone()))
    }

    /// Register a new job in the `pending` state.
    pub fn create(&self, command: &str, cwd: Option<&str>) -> Result<JobId> {
        let mut table = write(&self.table);

        if self.active.load(Ordering::SeqCst) >= self.config.max_active_jobs {
            return Err(Error::JobLimitReached(self.config.max_active_jobs));
        }

        let mut id = JobId::new();
        while table.entries.contains_key(&id) {
            id = JobId::new();
        }

        let entry = JobEntry {
            id: id.clone(),
            command: command.to_string(),
            cwd: cwd.map(str::to_string),
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            exit_code: None,
            stop_requested: false,
            output: OutputBuffer::new(self.config.max_output_bytes),
        };

        table
            .entries
            .insert(id.clone(), Arc::new(Mutex::new(entry)));
        table.order.push(id.clone());
        self.active.fetch_add(1, Ordering::SeqCst);

        debug!("Job registered: id={}, command='{}'", id, command);
        Ok(id)
    }

    /// Snapshot of one job, including its output.
    pub fn get(&self, id: &JobId) -> Result<Job> {
        let entry = self.entry(id)?;
        let snapshot = lock(&entry).snapshot();
        Ok(render(snapshot))
    }

    /// Current state of one job, without copying its output.
    pub fn state(&self, id: &JobId) -> Result<JobState> {
        let entry = self.entry(id)?;
        let state = lock(&entry).state;
        Ok(state)
    }

    /// Whether a stop has been requested for a job.
    pub fn stop_requested(&self, id: &JobId) -> Result<bool> {
        let entry = self.entry(id)?;
        let requested = lock(&entry).stop_requested;
        Ok(requested)
    }

    /// Summaries of all jobs, in creation order.
    pub fn list(&self) -> Vec<JobSummary> {
        let entries: Vec<SharedEntry> = {
            let table = read(&self.table);
            table
                .order
                .iter()
                .filter_map(|id| table.entries.get(id).cloned())
                .collect()
        };

        entries.iter().map(|entry| lock(entry).summary()).collect()
    }

    /// Apply a state transition.
    ///
    /// Entering `running` stamps `started_at`; entering a terminal state stamps
    /// `ended_at`, records `exit_code` and appends the history record, all
    /// while the job's lock is held.
    pub fn update_state(
        &self,
        id: &JobId,
        new_state: JobState,
        exit_code: Option<i32>,
    ) -> Result<Job> {
        self.transition(id, exit_code, |_| new_state)
    }

    /// Record the exit of a job's process.
    ///
    /// The final state is chosen under the job's lock: `stopped` if a stop was
    /// requested, otherwise `completed` for exit code zero and `failed` for
    /// anything else. This keeps a racing [`mark_stop_requested`] and the
    /// natural exit consistent with each other.
    ///
    /// [`mark_stop_requested`]: JobRegistry::mark_stop_requested
    pub fn finish(&self, id: &JobId, exit_code: i32) -> Result<Job> {
        self.transition(id, Some(exit_code), |job| {
            if job.stop_requested {
                JobState::Stopped
            } else if exit_code == 0 {
                JobState::Completed
            } else {
                JobState::Failed
            }
        })
    }

    fn transition<F>(&self, id: &JobId, exit_code: Option<i32>, choose: F) -> Result<Job>
    where
        F: FnOnce(&JobEntry) -> JobState,
    {
        let entry = self.entry(id)?;

        let (snapshot, new_state) = {
            let mut job = lock(&entry);
            let from = job.state;
            let new_state = choose(&*job);

            if !from.can_transition_to(new_state) {
                warn!(
                    "Rejected transition: id={}, {} -> {}",
                    id, from, new_state
                );
                return Err(Error::InvalidTransition {
                    id: id.clone(),
                    from,
                    to: new_state,
                });
            }

            let now = Utc::now();
            job.state = new_state;
            if new_state == JobState::Running {
                job.started_at = Some(now);
            }
            if new_state.is_terminal() {
                job.ended_at = Some(now);
                job.exit_code = exit_code;
            }

            if let Some(record) = HistoryRecord::from_summary(&job.summary()) {
                self.history.append(record);
            }

            info!(
                "Job state changed: id={}, {} → {}, exit_code={:?}",
                id, from, new_state, job.exit_code
            );
            (job.snapshot(), new_state)
        };

        if new_state.is_terminal() {
            self.active.fetch_sub(1, Ordering::SeqCst);
            if let Some(keep) = self.config.max_finished_jobs {
                self.prune(keep, Some(id));
            }
        }

        Ok(render(snapshot))
    }

    /// Append a chunk of output to a non-terminal job.
    pub fn append_output(&self, id: &JobId, chunk: &[u8]) -> Result<()> {
        let entry = self.entry(id)?;
        let mut job = lock(&entry);

        if job.state.is_terminal() {
            return Err(Error::AlreadyTerminal(id.clone()));
        }

        job.output.append(chunk);
        Ok(())
    }

    /// Mark a job as stop-requested.
    ///
    /// Returns the job's current state, or `AlreadyTerminal` if it already
    /// finished (in which case nothing is modified).
    pub fn mark_stop_requested(&self, id: &JobId) -> Result<JobState> {
        let entry = self.entry(id)?;
        let mut job = lock(&entry);

        if job.state.is_terminal() {
            return Err(Error::AlreadyTerminal(id.clone()));
        }

        job.stop_requested = true;
        Ok(job.state)
    }

    /// Remove a finished job from the registry.
    pub fn remove(&self, id: &JobId) -> Result<Job> {
        let mut table = write(&self.table);
        let entry = table
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(id.clone()))?;

        let snapshot = lock(&entry).snapshot();
        let job = render(snapshot);
        if !job.state.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "job {id} is still {}; stop it before removing",
                job.state
            )));
        }

        table.entries.remove(id);
        table.order.retain(|other| other != id);
        info!("Job removed: id={}", id);
        Ok(job)
    }

    /// Drop the oldest finished jobs so at most `keep` remain.
    ///
    /// Returns the number of jobs removed. Active jobs are never touched.
    pub fn prune_finished(&self, keep: usize) -> usize {
        self.prune(keep, None)
    }

    /// Prune finished jobs, never removing `spare` (the job that just finished).
    fn prune(&self, keep: usize, spare: Option<&JobId>) -> usize {
        let mut table = write(&self.table);

        let finished: Vec<JobId> = table
            .order
            .iter()
            .filter(|id| Some(*id) != spare)
            .filter(|id| {
                table
                    .entries
                    .get(*id)
                    .is_some_and(|entry| lock(entry).state.is_terminal())
            })
            .cloned()
            .collect();

        let keep = keep.saturating_sub(usize::from(spare.is_some()));
        let excess = finished.len().saturating_sub(keep);
        if excess == 0 {
            return 0;
        }

        for id in &finished[..excess] {
            table.entries.remove(id);
        }
        let table = &mut *table;
        table.order.retain(|id| table.entries.contains_key(id));

        debug!("Pruned {} finished job(s)", excess);
        excess
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        read(&self.table).entries.len()
    }

    /// Whether no jobs are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pending or running jobs.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
