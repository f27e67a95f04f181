//! # godmode-mcp-core
//!
//! Core types for the godmode MCP server.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other godmode-mcp crates. It provides:
//!
//! - Job types (JobId, JobState, Job, JobSummary)
//! - History records for terminal job outcomes
//! - Shell resolution for launching commands
//! - Configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - the job and server crates depend on
//! this one, but this crate has no dependencies on other godmode-mcp crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod history;
pub mod job;
pub mod shell;

// Re-export commonly used types
pub use config::{HistorySettings, JobSettings, ServerConfig, ServerSettings};
pub use error::{Error, Result};
pub use history::HistoryRecord;
pub use job::{Job, JobId, JobState, JobSummary, LAUNCH_FAILURE_EXIT_CODE};
pub use shell::Shell;
