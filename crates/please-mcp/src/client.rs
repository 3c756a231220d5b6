use std::sync::Arc;
use std::time::Duration;

use please_config::ServerTransport;
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::{RoleClient, RunningService, ServiceExt as _};
use rmcp::transport::TokioChildProcess;

use crate::error::McpError;
use crate::tool::ToolDefinition;

/// Default bound on connection establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-shot MCP client session against one upstream server
///
/// Connections are not held between invocations: callers connect, perform
/// one `list_tools` or `call_tool`, and close. Close errors are swallowed —
/// the operation's result is what matters.
pub struct McpClient {
    service: RunningService<RoleClient, ()>,
    server_name: String,
}

impl McpClient {
    /// Connect to an upstream over its resolved transport
    ///
    /// `access_token`, when present, is injected as a bearer `Authorization`
    /// header on the HTTP-based transports; stdio ignores it.
    pub async fn connect(
        name: &str,
        transport: &ServerTransport,
        access_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let connect = Self::connect_inner(name, transport, access_token);

        let service = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| McpError::Timeout {
                server: name.to_string(),
                secs: timeout.as_secs(),
            })??;

        tracing::debug!(server = name, "connected to MCP server");

        Ok(Self {
            service,
            server_name: name.to_string(),
        })
    }

    async fn connect_inner(
        name: &str,
        transport: &ServerTransport,
        access_token: Option<&str>,
    ) -> Result<RunningService<RoleClient, ()>, McpError> {
        match transport {
            ServerTransport::Stdio { command, args, env } => {
                Self::connect_stdio(command, args, env).await
            }
            ServerTransport::Sse { url } => Self::connect_sse(url.as_str(), access_token).await,
            ServerTransport::StreamableHttp { url } => {
                Self::connect_streamable_http(url.as_str(), access_token).await
            }
        }
        .map_err(|e| match e {
            McpError::Transport(msg) => McpError::Transport(format!("{name}: {msg}")),
            other => other,
        })
    }

    async fn connect_stdio(
        command: &str,
        args: &[String],
        env: &std::collections::HashMap<String, String>,
    ) -> Result<RunningService<RoleClient, ()>, McpError> {
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args);
        // The child inherits our environment; the overlay is applied on top
        for (k, v) in env {
            cmd.env(k, v);
        }

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| McpError::Transport(format!("failed to spawn process: {e}")))?;

        ().serve(transport)
            .await
            .map_err(|e| McpError::Transport(format!("stdio handshake failed: {e}")))
    }

    async fn connect_sse(
        url: &str,
        access_token: Option<&str>,
    ) -> Result<RunningService<RoleClient, ()>, McpError> {
        use rmcp::transport::SseClientTransport;
        use rmcp::transport::sse_client::SseClientConfig;

        let sse_config = SseClientConfig {
            sse_endpoint: Arc::from(url),
            ..Default::default()
        };

        let client = build_reqwest_client(access_token)?;

        let transport = SseClientTransport::start_with_client(client, sse_config)
            .await
            .map_err(|e| McpError::Transport(format!("SSE connection failed: {e}")))?;

        ().serve(transport)
            .await
            .map_err(|e| McpError::Transport(format!("SSE handshake failed: {e}")))
    }

    async fn connect_streamable_http(
        url: &str,
        access_token: Option<&str>,
    ) -> Result<RunningService<RoleClient, ()>, McpError> {
        use rmcp::transport::StreamableHttpClientTransport;
        use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;

        let mut transport_config = StreamableHttpClientTransportConfig::with_uri(url);
        if let Some(token) = access_token {
            transport_config = transport_config.auth_header(format!("Bearer {token}"));
        }

        let client = reqwest::Client::new();
        let transport = StreamableHttpClientTransport::with_client(client, transport_config);

        ().serve(transport)
            .await
            .map_err(|e| McpError::Transport(format!("streamable HTTP handshake failed: {e}")))
    }

    /// List the upstream's tools, adorned with provenance
    ///
    /// The externally-visible name becomes `server__tool`; the original name
    /// is preserved in metadata for execution.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let tools = self.service.list_all_tools().await.map_err(|e| {
            McpError::Transport(format!("list_tools failed on {}: {e}", self.server_name))
        })?;

        Ok(tools
            .iter()
            .map(|tool| ToolDefinition::from_rmcp(tool).adorn(&self.server_name))
            .collect())
    }

    /// Call a tool by its original (un-prefixed) name
    pub async fn call_tool(
        &self,
        original_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        self.service
            .call_tool(CallToolRequestParam {
                name: std::borrow::Cow::Owned(original_name.to_string()),
                arguments,
            })
            .await
            .map_err(|e| {
                McpError::Execution(format!(
                    "tool '{}' failed on {}: {e}",
                    original_name, self.server_name
                ))
            })
    }

    /// Close the session; errors here are logged and dropped
    pub async fn close(self) {
        if let Err(e) = self.service.cancel().await {
            tracing::debug!(server = %self.server_name, error = %e, "close failed, ignoring");
        }
    }
}

/// Build a reqwest client with an optional bearer default header
fn build_reqwest_client(access_token: Option<&str>) -> Result<reqwest::Client, McpError> {
    let mut builder = reqwest::Client::builder();

    if let Some(token) = access_token {
        let mut headers = reqwest::header::HeaderMap::new();
        let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| McpError::Transport(format!("invalid auth token: {e}")))?;
        headers.insert(reqwest::header::AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| McpError::Transport(format!("failed to build HTTP client: {e}")))
}
