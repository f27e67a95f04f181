//! Job runner: launches job commands and drives their lifecycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use godmode_mcp_core::{
    Error, HistoryRecord, Job, JobId, JobSettings, JobState, JobSummary, Result, ServerConfig,
    Shell, LAUNCH_FAILURE_EXIT_CODE,
};

use crate::history::HistoryLog;
use crate::process::{CommandSpec, ProcessHandle};
use crate::registry::{JobRegistry, RegistryConfig};
use crate::sync::lock;

const READ_CHUNK_SIZE: usize = 8192;

/// Settings that control how jobs are launched and stopped.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Shell used to run commands
    pub shell: Shell,
    /// Time between SIGTERM and SIGKILL when stopping a job
    pub stop_grace_period: Duration,
    /// Time to wait for output pipes to close after the process exits
    pub output_drain_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from(&JobSettings::default())
    }
}

impl From<&JobSettings> for RunnerSettings {
    fn from(settings: &JobSettings) -> Self {
        Self {
            shell: settings.resolved_shell(),
            stop_grace_period: settings.stop_grace_period(),
            output_drain_timeout: settings.output_drain_timeout(),
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Termination was signalled; the job becomes `stopped` once it exits
    StopRequested,
    /// The job had already finished; nothing was changed
    AlreadyTerminal(JobState),
}

type StopSignals = Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>;

/// Runs job commands in background tasks and reports through the registry.
#[derive(Debug, Clone)]
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    settings: RunnerSettings,
    stop_signals: StopSignals,
}

impl JobRunner {
    /// Create a runner on top of an existing registry.
    pub fn new(registry: Arc<JobRegistry>, settings: RunnerSettings) -> Self {
        Self {
            registry,
            settings,
            stop_signals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build the registry, history log and runner described by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let history = Arc::new(HistoryLog::from_settings(&config.history)?);
        let registry = Arc::new(JobRegistry::with_config(
            RegistryConfig::from(&config.jobs),
            history,
        ));
        Ok(Self::new(registry, RunnerSettings::from(&config.jobs)))
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Runner settings.
    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Register and launch a job; returns as soon as the job is registered.
    ///
    /// Launch failures do not surface here: the job is recorded as `failed`
    /// with the error in its output. Must be called within a tokio runtime.
    pub fn start(&self, command: &str, cwd: Option<&str>) -> Result<JobId> {
        if command.trim().is_empty() {
            return Err(Error::InvalidInput("command cannot be empty".into()));
        }

        let id = self.registry.create(command, cwd)?;
        let spec = CommandSpec::shell(&self.settings.shell, command, cwd);

        info!("Starting job: id={}, command='{}'", id, command);

        let stop_rx = self.arm_stop_signal(&id);
        self.spawn_task(id.clone(), spec, stop_rx);

        Ok(id)
    }

    /// Register the stop channel for a freshly created job.
    ///
    /// The id is visible to `stop` as soon as the registry creates it, so a
    /// stop may already be recorded here; it is forwarded to the channel.
    fn arm_stop_signal(&self, id: &JobId) -> watch::Receiver<bool> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut signals = lock(&self.stop_signals);
        if self.registry.stop_requested(id).unwrap_or(false) {
            debug!("Stop arrived before launch: id={}", id);
            stop_tx.send_replace(true);
        }
        signals.insert(id.clone(), stop_tx);
        stop_rx
    }

    fn spawn_task(&self, id: JobId, spec: CommandSpec, stop_rx: watch::Receiver<bool>) {
        let task = JobTask {
            id,
            registry: Arc::clone(&self.registry),
            settings: self.settings.clone(),
            stop_signals: Arc::clone(&self.stop_signals),
            stop_rx,
        };
        tokio::spawn(task.run(spec));
    }

    /// Request termination of a job.
    ///
    /// Stopping a job that already finished is a no-op reported as
    /// [`StopOutcome::AlreadyTerminal`].
    pub fn stop(&self, id: &JobId) -> Result<StopOutcome> {
        match self.registry.mark_stop_requested(id) {
            Ok(state) => {
                info!("Stop requested: id={}, state={}", id, state);
                if let Some(signal) = lock(&self.stop_signals).get(id) {
                    signal.send_replace(true);
                }
                Ok(StopOutcome::StopRequested)
            }
            Err(Error::AlreadyTerminal(_)) => {
                let state = self.registry.get(id)?.state;
                debug!("Stop ignored, job already {}: id={}", state, id);
                Ok(StopOutcome::AlreadyTerminal(state))
            }
            Err(e) => Err(e),
        }
    }

    /// Request termination of every active job. Returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        let ids: Vec<JobId> = lock(&self.stop_signals).keys().cloned().collect();
        ids.iter()
            .filter(|id| matches!(self.stop(id), Ok(StopOutcome::StopRequested)))
            .count()
    }

    /// Stop every active job and wait up to `timeout` for them to finish.
    ///
    /// Returns the number of jobs still active when the wait ended.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let signalled = self.stop_all();
        info!("Shutting down: {} job(s) signalled", signalled);

        let deadline = Instant::now() + timeout;
        while self.registry.active_count() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let remaining = self.registry.active_count();
        if remaining > 0 {
            warn!("{} job(s) still active at shutdown", remaining);
        }
        remaining
    }

    /// Snapshot of one job.
    pub fn status(&self, id: &JobId) -> Result<Job> {
        self.registry.get(id)
    }

    /// Wait up to `timeout` for a job to reach a terminal state.
    ///
    /// Returns the latest snapshot either way; check `state` to tell.
    pub async fn wait_for_terminal(&self, id: &JobId, timeout: Duration) -> Result<Job> {
        let deadline = Instant::now() + timeout;
        while !self.registry.state(id)?.is_terminal() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.registry.get(id)
    }

    /// Summaries of all jobs in creation order.
    pub fn list(&self) -> Vec<JobSummary> {
        self.registry.list()
    }

    /// History records, oldest first; `limit` keeps only the most recent.
    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryRecord> {
        let log = self.registry.history();
        match limit {
            Some(n) => log.read_tail(n),
            None => log.read_all(),
        }
    }
}

/// Everything one background job task owns.
struct JobTask {
    id: JobId,
    registry: Arc<JobRegistry>,
    settings: RunnerSettings,
    stop_signals: StopSignals,
    stop_rx: watch::Receiver<bool>,
}

impl JobTask {
    async fn run(mut self, spec: CommandSpec) {
        let recorded = match ProcessHandle::spawn(&spec) {
            Ok(process) => {
                let exit_code = self.supervise(process).await;
                self.registry.finish(&self.id, exit_code)
            }
            Err(e) => {
                error!("Job {} failed to launch: {}", self.id, e);
                let message = format!("Failed to launch command: {e}\n");
                self.append(message.as_bytes());
                self.registry.update_state(
                    &self.id,
                    JobState::Failed,
                    Some(LAUNCH_FAILURE_EXIT_CODE),
                )
            }
        };

        if let Err(e) = recorded {
            warn!("Could not record final state for job {}: {}", self.id, e);
        }
        lock(&self.stop_signals).remove(&self.id);
    }

    /// Run a launched process to completion, honouring stop requests.
    ///
    /// Returns the exit code; the caller turns it into the terminal state.
    async fn supervise(&mut self, mut process: ProcessHandle) -> i32 {
        match self.registry.update_state(&self.id, JobState::Running, None) {
            Ok(_) => info!("Job {} running: pid={:?}", self.id, process.pid()),
            Err(e) => warn!("Could not mark job {} running: {}", self.id, e),
        }

        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = process.take_stdout() {
            readers.push(self.spawn_reader(stdout));
        }
        if let Some(stderr) = process.take_stderr() {
            readers.push(self.spawn_reader(stderr));
        }

        let killer = process.killer();
        let mut kill_deadline: Option<Instant> = None;
        let mut killed = false;

        let waited = loop {
            tokio::select! {
                status = process.wait() => break status,
                Ok(()) = self.stop_rx.changed(), if kill_deadline.is_none() => {
                    info!("Sending SIGTERM to job {}", self.id);
                    if let Err(e) = killer.terminate(false) {
                        warn!("Failed to signal job {}: {}", self.id, e);
                    }
                    kill_deadline = Some(Instant::now() + self.settings.stop_grace_period);
                }
                _ = tokio::time::sleep_until(kill_deadline.unwrap_or_else(Instant::now)),
                    if kill_deadline.is_some() && !killed =>
                {
                    warn!(
                        "Job {} still running after {:?}, killing",
                        self.id, self.settings.stop_grace_period
                    );
                    if let Err(e) = killer.terminate(true) {
                        warn!("Failed to kill job {}: {}", self.id, e);
                    }
                    killed = true;
                }
            }
        };

        self.drain(&mut readers).await;

        match waited {
            Ok(code) => code,
            Err(e) => {
                error!("Failed waiting on job {}: {}", self.id, e);
                self.append(format!("Failed waiting for process: {e}\n").as_bytes());
                LAUNCH_FAILURE_EXIT_CODE
            }
        }
    }

    fn spawn_reader<R>(&self, reader: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(pump_output(
            reader,
            Arc::clone(&self.registry),
            self.id.clone(),
        ))
    }

    /// Wait for the output readers, abandoning them after the drain timeout.
    async fn drain(&self, readers: &mut [JoinHandle<()>]) {
        let all_closed = async {
            for reader in readers.iter_mut() {
                let _ = reader.await;
            }
        };

        if tokio::time::timeout(self.settings.output_drain_timeout, all_closed)
            .await
            .is_err()
        {
            warn!(
                "Output of job {} still open after {:?}, detaching",
                self.id, self.settings.output_drain_timeout
            );
            for reader in readers.iter() {
                reader.abort();
            }
        }
    }

    fn append(&self, bytes: &[u8]) {
        if let Err(e) = self.registry.append_output(&self.id, bytes) {
            debug!("Dropped output for job {}: {}", self.id, e);
        }
    }
}

/// Copy a pipe into the job's output buffer, one append per read.
async fn pump_output<R>(mut reader: R, registry: Arc<JobRegistry>, id: JobId)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                debug!("Job output: id={}, {} bytes", id, n);
                if registry.append_output(&id, &chunk[..n]).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Error reading output of job {}: {}", id, e);
                break;
            }
        }
    }
}
