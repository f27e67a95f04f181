//! Integration tests for the godmode-mcp server.
//!
//! These drive the same entry points the MCP tools use, with real shell
//! commands, and check what a client would see.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use godmode_mcp::{
    CheckStatusParams, GodModeMcpServer, ReadHistoryParams, StartParams, StopParams,
};
use godmode_mcp_core::{JobState, ServerConfig, Shell};
use godmode_mcp_jobs::{JobRegistry, JobRunner, RunnerSettings};

const WAIT_MS: u64 = 10_000;

fn server() -> GodModeMcpServer {
    let settings = RunnerSettings {
        shell: Shell::from_program("/bin/sh"),
        stop_grace_period: Duration::from_millis(500),
        output_drain_timeout: Duration::from_millis(500),
    };
    GodModeMcpServer::new(JobRunner::new(Arc::new(JobRegistry::new()), settings), 20)
}

fn start(server: &GodModeMcpServer, command: &str) -> String {
    server
        .start_job(StartParams {
            command: command.to_string(),
            cwd: None,
        })
        .unwrap()
        .job_id
}

fn status_params(job_id: &str) -> CheckStatusParams {
    CheckStatusParams {
        job_id: job_id.to_string(),
        lines: None,
        wait_ms: Some(WAIT_MS),
    }
}

#[tokio::test]
async fn test_echo_job_completes() {
    let server = server();
    let job_id = start(&server, "echo hello");

    let status = server.job_status(status_params(&job_id)).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.exit_code, Some(0));
    assert!(status.output.contains("hello"));
    assert!(status.ended_at.is_some());
}

#[tokio::test]
async fn test_nonexistent_binary_reports_failure() {
    let server = server();
    let job_id = start(&server, "/nonexistent/binary");

    let status = server.job_status(status_params(&job_id)).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_ne!(status.exit_code, Some(0));
    assert!(!status.output.trim().is_empty());
}

#[tokio::test]
async fn test_stop_long_running_job() {
    let server = server();
    let job_id = start(&server, "sleep 100");

    let stop = server
        .stop_job(StopParams {
            job_id: job_id.clone(),
        })
        .unwrap();
    assert_eq!(stop.outcome, "stop_requested");

    let status = server.job_status(status_params(&job_id)).await.unwrap();
    assert_eq!(status.state, JobState::Stopped);
    assert!(status.ended_at.is_some());

    let history = server.global_history(ReadHistoryParams::default());
    assert_eq!(history.count, 1);
    assert_eq!(history.records[0].id.as_str(), job_id);
    assert_eq!(history.records[0].state, JobState::Stopped);

    // a second stop is a no-op
    let again = server.stop_job(StopParams { job_id }).unwrap();
    assert_eq!(again.outcome, "already_terminal");
    assert_eq!(again.state, JobState::Stopped);
}

#[tokio::test]
async fn test_history_follows_completion_order() {
    let server = server();
    let slow = start(&server, "sleep 0.6; echo slow");
    let fast = start(&server, "echo fast");

    for id in [&slow, &fast] {
        server.job_status(status_params(id)).await.unwrap();
    }

    let ids: Vec<String> = server
        .global_history(ReadHistoryParams::default())
        .records
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(ids, vec![fast, slow]);
}

#[tokio::test]
async fn test_list_jobs_in_creation_order() {
    let server = server();
    let ids: Vec<String> = (0..4).map(|i| start(&server, &format!("exit {i}"))).collect();

    let list = server.job_list();
    assert_eq!(list.count, 4);
    let listed: Vec<String> = list.jobs.iter().map(|j| j.id.to_string()).collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_status_tail_lines() {
    let server = server();
    let job_id = start(&server, "for i in 1 2 3 4 5; do echo line$i; done");

    let status = server
        .job_status(CheckStatusParams {
            job_id,
            lines: Some(2),
            wait_ms: Some(WAIT_MS),
        })
        .await
        .unwrap();
    assert_eq!(status.output, "line4\nline5");
}

#[tokio::test]
async fn test_unknown_job_is_invalid_params() {
    let server = server();

    let err = server
        .job_status(CheckStatusParams {
            job_id: "ffffffff".to_string(),
            lines: None,
            wait_ms: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
    assert!(err.message.contains("ffffffff"));

    let err = server
        .stop_job(StopParams {
            job_id: "ffffffff".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.code.0, -32602);

    let err = server
        .stop_job(StopParams {
            job_id: "  ".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
}

#[tokio::test]
async fn test_empty_command_rejected() {
    let server = server();
    let err = server
        .start_job(StartParams {
            command: "   ".to_string(),
            cwd: None,
        })
        .unwrap_err();
    assert_eq!(err.code.0, -32602);
    assert_eq!(server.job_list().count, 0);
}

#[tokio::test]
async fn test_history_file_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let yaml = format!(
        "jobs:\n  shell: /bin/sh\n  default_tail_lines: 5\nhistory:\n  file: {}\n",
        path.display()
    );
    let config = ServerConfig::from_yaml(&yaml).unwrap();

    let server = GodModeMcpServer::from_config(&config).unwrap();
    let job_id = start(&server, "echo persisted");
    server.job_status(status_params(&job_id)).await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains(&job_id));

    // a fresh server picks up the earlier record
    let reloaded = GodModeMcpServer::from_config(&config).unwrap();
    let history = reloaded.global_history(ReadHistoryParams::default());
    assert_eq!(history.count, 1);
    assert_eq!(history.records[0].state, JobState::Completed);
}
