//! Godmode MCP Server Implementation
//!
//! This module implements the MCP server using rmcp 0.9's #[tool_router] pattern.
//! It routes MCP tool calls to the background job runner.

use std::time::Duration;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use godmode_mcp_core::{Error, JobId, ServerConfig};
use godmode_mcp_jobs::{JobRunner, StopOutcome};

use crate::tools::*;

/// Upper bound for `wait_ms` on check_status.
const MAX_WAIT_MS: u64 = 60_000;

/// Map a job error onto an MCP error.
///
/// Lookup and parameter problems are the caller's fault (invalid params);
/// anything else is an internal error.
fn to_mcp_error(err: Error) -> McpError {
    let code = match &err {
        Error::JobNotFound(_) | Error::InvalidInput(_) | Error::JobLimitReached(_) => {
            ErrorCode(-32602) // Invalid params
        }
        _ => ErrorCode(-32603), // Internal error
    };
    McpError::new(code, err.to_string(), None)
}

fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::new(ErrorCode(-32602), message.into(), None)
}

fn parse_job_id(job_id: &str) -> Result<JobId, McpError> {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return Err(invalid_params("job_id cannot be empty"));
    }
    Ok(JobId::from(job_id))
}

fn json_result<T: Serialize>(response: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(response)
            .unwrap_or_else(|e| format!("failed to serialize response: {e}")),
    )])
}

/// Godmode MCP Server
///
/// Launches shell commands as background jobs and exposes their lifecycle
/// via MCP tools.
#[derive(Clone)]
pub struct GodModeMcpServer {
    /// Job runner (shared registry and history)
    runner: JobRunner,
    /// Tool router for handling MCP tool calls
    tool_router: ToolRouter<Self>,
    /// Output lines returned by check_status when `lines` is omitted
    default_tail_lines: usize,
}

#[tool_router]
impl GodModeMcpServer {
    /// Create a server around an existing runner
    pub fn new(runner: JobRunner, default_tail_lines: usize) -> Self {
        Self {
            runner,
            tool_router: Self::tool_router(),
            default_tail_lines,
        }
    }

    /// Create a server from configuration
    pub fn from_config(config: &ServerConfig) -> godmode_mcp_core::Result<Self> {
        let runner = JobRunner::from_config(config)?;
        Ok(Self::new(runner, config.jobs.default_tail_lines))
    }

    /// The job runner behind this server
    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Start a background job
    #[tool(
        description = "Start a shell command as a background job. Returns a job_id immediately; use check_status to follow it."
    )]
    #[instrument(skip_all)]
    async fn start(
        &self,
        Parameters(params): Parameters<StartParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.start_job(params)?;
        Ok(json_result(&response))
    }

    /// Check a job's status and output
    #[tool(
        description = "Get the state, exit code and recent output of a background job. Optionally wait up to wait_ms for it to finish."
    )]
    #[instrument(skip_all)]
    async fn check_status(
        &self,
        Parameters(params): Parameters<CheckStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.job_status(params).await?;
        Ok(json_result(&response))
    }

    /// Stop a job
    #[tool(description = "Stop a background job (SIGTERM, then SIGKILL after a grace period)")]
    #[instrument(skip_all)]
    async fn stop(
        &self,
        Parameters(params): Parameters<StopParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.stop_job(params)?;
        Ok(json_result(&response))
    }

    /// List all jobs
    #[tool(description = "List all background jobs known to the server, oldest first")]
    #[instrument(skip_all)]
    async fn list_jobs(
        &self,
        Parameters(_params): Parameters<ListJobsParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(json_result(&self.job_list()))
    }

    /// Read the history of finished jobs
    #[tool(description = "Read the chronological history of finished jobs")]
    #[instrument(skip_all)]
    async fn read_global_history(
        &self,
        Parameters(params): Parameters<ReadHistoryParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(json_result(&self.global_history(params)))
    }

    /// Combined entry point selecting the operation by `action`
    #[tool(
        description = "Manage background jobs with a single tool: action is one of start, check_status, stop, list_jobs, read_global_history"
    )]
    #[instrument(skip_all)]
    async fn process_manager(
        &self,
        Parameters(params): Parameters<ProcessManagerParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!("process_manager: action={:?}", params.action);

        match params.action {
            ProcessAction::Start => {
                let command = params
                    .command
                    .ok_or_else(|| invalid_params("'command' is required for action 'start'"))?;
                let response = self.start_job(StartParams {
                    command,
                    cwd: params.cwd,
                })?;
                Ok(json_result(&response))
            }
            ProcessAction::CheckStatus => {
                let job_id = params.job_id.ok_or_else(|| {
                    invalid_params("'job_id' is required for action 'check_status'")
                })?;
                let response = self
                    .job_status(CheckStatusParams {
                        job_id,
                        lines: params.lines,
                        wait_ms: params.wait_ms,
                    })
                    .await?;
                Ok(json_result(&response))
            }
            ProcessAction::Stop => {
                let job_id = params
                    .job_id
                    .ok_or_else(|| invalid_params("'job_id' is required for action 'stop'"))?;
                let response = self.stop_job(StopParams { job_id })?;
                Ok(json_result(&response))
            }
            ProcessAction::ListJobs => Ok(json_result(&self.job_list())),
            ProcessAction::ReadGlobalHistory => Ok(json_result(
                &self.global_history(ReadHistoryParams {
                    limit: params.limit,
                }),
            )),
        }
    }
}

impl GodModeMcpServer {
    /// Launch a job and describe it.
    pub fn start_job(&self, params: StartParams) -> Result<JobStartResponse, McpError> {
        info!(
            "Starting job: command='{}', cwd={:?}",
            params.command, params.cwd
        );

        let cwd = params.cwd.as_deref().filter(|dir| !dir.trim().is_empty());
        let id = self
            .runner
            .start(&params.command, cwd)
            .map_err(to_mcp_error)?;
        let state = self.runner.status(&id).map_err(to_mcp_error)?.state;

        Ok(JobStartResponse {
            job_id: id.to_string(),
            command: params.command,
            state,
            message: format!("Job '{id}' started"),
        })
    }

    /// Current status of a job, optionally waiting for it to finish.
    pub async fn job_status(
        &self,
        params: CheckStatusParams,
    ) -> Result<JobStatusResponse, McpError> {
        let id = parse_job_id(&params.job_id)?;
        let lines = params.lines.unwrap_or(self.default_tail_lines);

        let job = match params.wait_ms.filter(|ms| *ms > 0) {
            Some(ms) => {
                let timeout = Duration::from_millis(ms.min(MAX_WAIT_MS));
                debug!("Waiting for job {} for up to {:?}", id, timeout);
                self.runner.wait_for_terminal(&id, timeout).await
            }
            None => self.runner.status(&id),
        }
        .map_err(|e| {
            warn!("Status lookup failed: job_id={}, error={}", id, e);
            to_mcp_error(e)
        })?;

        debug!("Job status: id={}, state={}", id, job.state);
        Ok(JobStatusResponse::from_job(&job, lines))
    }

    /// Request termination of a job.
    pub fn stop_job(&self, params: StopParams) -> Result<StopResponse, McpError> {
        let id = parse_job_id(&params.job_id)?;
        info!("Stopping job: job_id={}", id);

        let outcome = self.runner.stop(&id).map_err(|e| {
            warn!("Stop failed: job_id={}, error={}", id, e);
            to_mcp_error(e)
        })?;

        let response = match outcome {
            StopOutcome::StopRequested => {
                let state = self.runner.status(&id).map_err(to_mcp_error)?.state;
                StopResponse {
                    job_id: id.to_string(),
                    outcome: "stop_requested".to_string(),
                    state,
                    message: format!("Stop requested for job '{id}'"),
                }
            }
            StopOutcome::AlreadyTerminal(state) => StopResponse {
                job_id: id.to_string(),
                outcome: "already_terminal".to_string(),
                state,
                message: format!("Job '{id}' already {state}; nothing to stop"),
            },
        };
        Ok(response)
    }

    /// Summaries of all jobs.
    pub fn job_list(&self) -> JobListResponse {
        let jobs = self.runner.list();
        let count = jobs.len();
        info!("Found {} job(s)", count);
        JobListResponse { jobs, count }
    }

    /// Finished-job history, oldest first.
    pub fn global_history(&self, params: ReadHistoryParams) -> HistoryResponse {
        let records = self.runner.history(params.limit);
        let count = records.len();
        debug!("Read {} history record(s)", count);
        HistoryResponse { records, count }
    }
}

// Implement the ServerHandler trait to define server capabilities
#[tool_handler]
impl rmcp::ServerHandler for GodModeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Godmode MCP Server - Run shell commands as background jobs. \
                 Use start to launch a command, check_status to read its state and output, \
                 stop to terminate it, list_jobs to see every job and read_global_history \
                 for the record of finished jobs. process_manager offers the same operations \
                 through a single tool with an action argument."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
