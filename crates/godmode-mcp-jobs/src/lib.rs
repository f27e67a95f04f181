//! # godmode-mcp-jobs
//!
//! Background job lifecycle management for the godmode MCP server.
//!
//! This crate provides:
//! - The job registry (authoritative, concurrently accessible job table)
//! - The job runner (launches commands, captures output, handles stop)
//! - The history log (append-only record of finished jobs)
//! - Bounded output buffering
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on godmode-mcp-core
//! and is driven by the MCP server crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod history;
pub mod output;
pub mod process;
pub mod registry;
pub mod runner;

mod sync;

// Re-export commonly used types
pub use history::HistoryLog;
pub use output::OutputBuffer;
pub use process::{CommandSpec, ProcessHandle, ProcessKiller};
pub use registry::{JobRegistry, RegistryConfig};
pub use runner::{JobRunner, RunnerSettings, StopOutcome};
