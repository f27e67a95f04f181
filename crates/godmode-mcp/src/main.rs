//! # Godmode MCP Server
//!
//! Model Context Protocol server that lets AI agents run long-lived shell
//! commands in the background and follow them to completion.
//!
//! ## Overview
//!
//! This server provides MCP tools for:
//! - Launching commands (start)
//! - Inspecting state and output (check_status, list_jobs)
//! - Terminating jobs (stop)
//! - Auditing finished jobs (read_global_history)
//!
//! ## Architecture
//!
//! This is Layer 2 - the main MCP server binary that ties together:
//! - godmode-mcp-core: Core types and configuration
//! - godmode-mcp-jobs: Job registry, runner and history log

use anyhow::Context;
use rmcp::{transport::stdio, ServiceExt};

use godmode_mcp::GodModeMcpServer;
use godmode_mcp_core::ServerConfig;

fn config_path(args: &[String]) -> Option<&str> {
    args.iter()
        .position(|arg| arg == "--config" || arg == "-c")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config = match config_path(&args) {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => ServerConfig::default(),
    };

    // Initialize logging; stdout carries the MCP protocol
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!(
        "Godmode MCP Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let server = GodModeMcpServer::from_config(&config)?;
    let runner = server.runner().clone();

    tracing::info!("Server initialized, starting stdio transport...");

    // Serve the MCP server over stdio
    let service = server.serve(stdio()).await.map_err(|e| {
        tracing::error!("Error starting server: {}", e);
        e
    })?;

    tracing::info!("Godmode MCP Server running on stdio");

    // Wait for the service to complete
    service.waiting().await?;

    let grace = runner.settings().stop_grace_period + runner.settings().output_drain_timeout;
    runner.shutdown(grace).await;

    tracing::info!("Godmode MCP Server shutting down");

    Ok(())
}
