#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Upstream MCP plumbing: the single-shot transport client, the sequential
//! discovery engine, and the tool executor that routes a qualified tool name
//! back to its origin server.

mod client;
mod discovery;
mod error;
mod executor;
mod tool;

pub use client::{DEFAULT_CONNECT_TIMEOUT, McpClient};
pub use discovery::{DiscoveryEngine, DiscoveryOutcome, DiscoveryPhase, ProgressFn};
pub use error::McpError;
pub use executor::{ExecutionFailure, ToolExecutor};
pub use tool::{
    METADATA_ORIGINAL_NAME, METADATA_SERVER, TOOL_SEPARATOR, ToolDefinition, qualify,
    split_qualified,
};
