use thiserror::Error;

/// Authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// No stored session and the caller cannot run an interactive flow
    #[error("no OAuth session for '{server}'; run `please mcp auth {server}` to sign in")]
    NoSession { server: String },

    /// Authorization-server metadata could not be resolved
    #[error("authorization server discovery failed: {0}")]
    Discovery(String),

    /// Dynamic client registration was refused
    #[error("dynamic client registration failed: {0}")]
    Registration(String),

    /// Every candidate callback port was occupied
    #[error("no free callback port in {start}-{end}; close whatever is listening there")]
    PortsExhausted { start: u16, end: u16 },

    /// Callback listener failed for a reason other than a busy port
    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Callback `state` did not match the one sent — treated as CSRF
    #[error("authorization callback state mismatch (possible CSRF), aborting")]
    StateMismatch,

    /// Authorization server reported an error on the callback
    #[error("authorization server returned error: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    CallbackError {
        error: String,
        description: Option<String>,
    },

    /// Callback arrived without an authorization code
    #[error("authorization callback carried no code")]
    MissingCode,

    /// User never completed the browser flow
    #[error("timed out waiting for the authorization callback")]
    CallbackTimeout,

    /// Code-for-token exchange failed
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Refresh grant failed; caller falls back to a fresh flow
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Token store I/O failure
    #[error("token store error at {path}: {source}")]
    Store {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored artifact is not valid JSON
    #[error("corrupt token store file {path}: {source}")]
    CorruptStore {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP failure talking to the authorization server
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
