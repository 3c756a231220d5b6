use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Home directory could not be determined
    #[error("could not determine home directory")]
    NoHomeDir,

    /// Working directory could not be determined
    #[error("could not determine working directory: {0}")]
    NoWorkingDir(#[source] std::io::Error),

    /// Config file exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file exists but is not valid JSON
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Server declares neither a command nor a URL
    #[error("server '{server}' has neither a command nor a url")]
    MissingEndpoint { server: String },

    /// Transport requested that the server's fields cannot satisfy
    #[error("server '{server}' requests {transport} transport but lacks {missing}")]
    TransportMismatch {
        server: String,
        transport: &'static str,
        missing: &'static str,
    },

    /// Named server is not present in any loaded scope
    #[error("server '{name}' is not configured; add it with `please mcp add {name}`")]
    UnknownServer { name: String },

    /// Scope string from the CLI is not recognized
    #[error("unknown scope '{0}' (expected project, user, or all)")]
    UnknownScope(String),

    /// Write failure when persisting a config file
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
