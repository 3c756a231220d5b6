use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use please_config::{Authorization, UpstreamConfig};
use please_oauth::{OAuthManager, TokenStore};
use secrecy::ExposeSecret as _;
use tokio_util::sync::CancellationToken;

use crate::client::{DEFAULT_CONNECT_TIMEOUT, McpClient};
use crate::error::McpError;
use crate::tool::ToolDefinition;

/// Phases reported while an upstream is being queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Connecting,
    Authenticating,
    Fetching,
    Done,
    Error,
}

/// Progress callback keyed by upstream name and phase
pub type ProgressFn = dyn Fn(&str, DiscoveryPhase) + Send + Sync;

/// Result of querying one upstream
#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub server: String,
    pub result: Result<Vec<ToolDefinition>, McpError>,
}

impl DiscoveryOutcome {
    pub fn tools(&self) -> &[ToolDefinition] {
        self.result.as_deref().unwrap_or(&[])
    }
}

/// Fans out to all configured upstreams and collects tool definitions
///
/// Upstreams are queried sequentially to bound process and file-descriptor
/// pressure; one upstream failing never aborts the pass. Cancellation is
/// honored between upstreams, not mid-upstream.
pub struct DiscoveryEngine {
    servers: IndexMap<String, UpstreamConfig>,
    exclude: Vec<String>,
    timeout: Duration,
    oauth_root: PathBuf,
    progress: Option<Box<ProgressFn>>,
    cancel: CancellationToken,
}

impl DiscoveryEngine {
    pub fn new(servers: IndexMap<String, UpstreamConfig>, oauth_root: PathBuf) -> Self {
        Self {
            servers,
            exclude: Vec::new(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
            oauth_root,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Skip upstreams by name
    pub fn exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(names);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_progress(
        mut self,
        callback: impl Fn(&str, DiscoveryPhase) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn report(&self, server: &str, phase: DiscoveryPhase) {
        if let Some(cb) = &self.progress {
            cb(server, phase);
        }
    }

    /// Run the pass: one outcome per non-excluded upstream, in config order
    pub async fn discover(&self) -> Vec<DiscoveryOutcome> {
        let mut outcomes = Vec::new();

        for (name, config) in &self.servers {
            if self.cancel.is_cancelled() {
                tracing::info!("discovery cancelled, skipping remaining upstreams");
                break;
            }

            if self.exclude.iter().any(|e| e == name) {
                tracing::debug!(server = %name, "excluded from discovery");
                continue;
            }

            let result = self.discover_one(name, config).await;

            match &result {
                Ok(tools) => {
                    self.report(name, DiscoveryPhase::Done);
                    tracing::info!(server = %name, tools = tools.len(), "discovered tools");
                }
                Err(e) => {
                    self.report(name, DiscoveryPhase::Error);
                    tracing::warn!(server = %name, error = %e, "discovery failed, continuing");
                }
            }

            outcomes.push(DiscoveryOutcome {
                server: name.clone(),
                result,
            });
        }

        outcomes
    }

    async fn discover_one(
        &self,
        name: &str,
        config: &UpstreamConfig,
    ) -> Result<Vec<ToolDefinition>, McpError> {
        let token = self.resolve_token(name, config).await?;
        let transport = config.resolve_transport(name)?;

        self.report(name, DiscoveryPhase::Connecting);
        let client = McpClient::connect(name, &transport, token.as_deref(), self.timeout).await?;

        self.report(name, DiscoveryPhase::Fetching);
        let result = client.list_tools().await;

        client.close().await;
        result
    }

    /// Resolve credentials for one upstream
    ///
    /// OAuth upstreams without a usable stored session fail here with the
    /// guidance error naming `please mcp auth`; discovery never opens a
    /// browser.
    async fn resolve_token(
        &self,
        name: &str,
        config: &UpstreamConfig,
    ) -> Result<Option<String>, McpError> {
        match config.authorization() {
            Authorization::None => Ok(None),
            Authorization::Bearer { token } => {
                self.report(name, DiscoveryPhase::Authenticating);
                Ok(Some(token.expose_secret().to_string()))
            }
            Authorization::Oauth2 { oauth } => {
                self.report(name, DiscoveryPhase::Authenticating);

                let url = config.url.clone().ok_or_else(|| {
                    McpError::Transport(format!("server '{name}' uses oauth2 but has no url"))
                })?;

                let manager = OAuthManager::new(
                    name,
                    url,
                    oauth.clone().unwrap_or_default(),
                    TokenStore::new(&self.oauth_root),
                );

                let token = manager.get_access_token_noninteractive().await?;
                Ok(Some(token))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn servers(json: &str) -> IndexMap<String, UpstreamConfig> {
        let file: please_config::McpServersFile = serde_json::from_str(json).expect("config");
        file.mcp_servers
    }

    fn engine(json: &str) -> (tempfile::TempDir, DiscoveryEngine) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let engine = DiscoveryEngine::new(servers(json), tmp.path().to_path_buf());
        (tmp, engine)
    }

    #[tokio::test]
    async fn failed_upstream_does_not_abort_the_pass() {
        // Both commands do not exist; both upstreams must still be reported
        let (_tmp, engine) = engine(
            r#"{ "mcpServers": {
                "a": { "command": "/nonexistent/a" },
                "b": { "command": "/nonexistent/b" } } }"#,
        );

        let outcomes = engine.timeout(Duration::from_secs(2)).discover().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.is_err()));
        assert_eq!(outcomes[0].server, "a");
        assert_eq!(outcomes[1].server, "b");
    }

    #[tokio::test]
    async fn excluded_upstreams_are_skipped() {
        let (_tmp, engine) = engine(
            r#"{ "mcpServers": {
                "a": { "command": "/nonexistent/a" },
                "b": { "command": "/nonexistent/b" } } }"#,
        );

        let outcomes = engine
            .exclude(["a".to_string()])
            .timeout(Duration::from_secs(2))
            .discover()
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].server, "b");
    }

    #[tokio::test]
    async fn oauth_without_session_yields_guidance_error() {
        let (_tmp, engine) = engine(
            r#"{ "mcpServers": {
                "calendar": {
                    "url": "https://mcp.example.invalid/mcp",
                    "authorization": { "type": "oauth2" } } } }"#,
        );

        let outcomes = engine.discover().await;
        let err = outcomes[0].result.as_ref().expect_err("no session");
        assert!(err.to_string().contains("please mcp auth calendar"));
    }

    #[tokio::test]
    async fn cancellation_stops_between_upstreams() {
        let (_tmp, engine) = engine(
            r#"{ "mcpServers": {
                "a": { "command": "/nonexistent/a" },
                "b": { "command": "/nonexistent/b" } } }"#,
        );

        let token = CancellationToken::new();
        let seen = AtomicUsize::new(0);
        let cancel = token.clone();

        let outcomes = engine
            .cancel_token(token)
            .timeout(Duration::from_secs(2))
            .on_progress(move |_, phase| {
                if phase == DiscoveryPhase::Error && seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    cancel.cancel();
                }
            })
            .discover()
            .await;

        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn progress_phases_arrive_in_order() {
        let (_tmp, engine) = engine(r#"{ "mcpServers": { "a": { "command": "/nonexistent/a" } } }"#);

        let phases = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();

        engine
            .timeout(Duration::from_secs(2))
            .on_progress(move |server, phase| {
                sink.lock().expect("lock").push((server.to_string(), phase));
            })
            .discover()
            .await;

        let phases = phases.lock().expect("lock");
        assert_eq!(
            *phases,
            vec![
                ("a".to_string(), DiscoveryPhase::Connecting),
                ("a".to_string(), DiscoveryPhase::Error),
            ]
        );
    }
}
