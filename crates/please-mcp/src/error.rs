use thiserror::Error;

/// Upstream transport and protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Connection could not be established within the configured timeout
    #[error("connection to '{server}' timed out after {secs}s")]
    Timeout { server: String, secs: u64 },

    /// Transport-level connection or communication error
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream rejected or failed the tool call
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// Server configuration cannot produce a connection
    #[error(transparent)]
    Config(#[from] please_config::ConfigError),

    /// Upstream requires authorization that is not available
    #[error(transparent)]
    Auth(#[from] please_oauth::AuthError),
}
