use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use please_config::{Authorization, UpstreamConfig};
use please_oauth::{OAuthManager, TokenStore};
use rmcp::model::CallToolResult;
use secrecy::ExposeSecret as _;

use crate::client::{DEFAULT_CONNECT_TIMEOUT, McpClient};
use crate::tool::ToolDefinition;

/// Why a tool execution could not be attempted or did not complete
///
/// Upstream results carrying `isError=true` are not failures at this level;
/// they come back as a successful `CallToolResult` for the caller to
/// interpret.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("tool '{name}' is not in the index")]
    ToolNotFound { name: String },

    #[error("tool '{name}' has no provenance metadata")]
    MetadataMissing { name: String },

    #[error("tool '{name}' came from server '{server}', which is not configured")]
    ServerNotConfigured { name: String, server: String },

    #[error("server '{server}' requires authorization")]
    AuthRequired { server: String },

    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },
}

impl ExecutionFailure {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            Self::MetadataMissing { .. } => "METADATA_MISSING",
            Self::ServerNotConfigured { .. } => "SERVER_NOT_CONFIGURED",
            Self::AuthRequired { .. } => "AUTH_REQUIRED",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
        }
    }

    /// CLI verb the user can run to remediate, where one exists
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ToolNotFound { .. } | Self::MetadataMissing { .. } => {
                Some("run `please index` to rebuild the tool index".to_string())
            }
            Self::ServerNotConfigured { server, .. } => {
                Some(format!("run `please mcp add {server}` to configure it"))
            }
            Self::AuthRequired { server } => {
                Some(format!("run `please mcp auth {server}` to sign in"))
            }
            Self::ExecutionFailed { .. } => None,
        }
    }
}

/// Resolves a qualified tool name to its upstream and dispatches the call
pub struct ToolExecutor {
    servers: IndexMap<String, UpstreamConfig>,
    oauth_root: PathBuf,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(servers: IndexMap<String, UpstreamConfig>, oauth_root: PathBuf) -> Self {
        Self {
            servers,
            oauth_root,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute `qualified_name` with `arguments` against its origin server
    ///
    /// `tools` is the (merged) indexed tool list; the lookup there supplies
    /// the provenance that routes the call.
    pub async fn execute(
        &self,
        tools: &[ToolDefinition],
        qualified_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, ExecutionFailure> {
        let tool = tools
            .iter()
            .find(|t| t.name == qualified_name)
            .ok_or_else(|| ExecutionFailure::ToolNotFound {
                name: qualified_name.to_string(),
            })?;

        let (server_name, original_name) =
            tool.provenance()
                .ok_or_else(|| ExecutionFailure::MetadataMissing {
                    name: qualified_name.to_string(),
                })?;

        let config =
            self.servers
                .get(server_name)
                .ok_or_else(|| ExecutionFailure::ServerNotConfigured {
                    name: qualified_name.to_string(),
                    server: server_name.to_string(),
                })?;

        let token = self.resolve_token(server_name, config).await?;

        let transport =
            config
                .resolve_transport(server_name)
                .map_err(|e| ExecutionFailure::ExecutionFailed {
                    message: e.to_string(),
                })?;

        let client = McpClient::connect(server_name, &transport, token.as_deref(), self.timeout)
            .await
            .map_err(|e| ExecutionFailure::ExecutionFailed {
                message: e.to_string(),
            })?;

        let result = client.call_tool(original_name, arguments).await;
        client.close().await;

        result.map_err(|e| ExecutionFailure::ExecutionFailed {
            message: e.to_string(),
        })
    }

    async fn resolve_token(
        &self,
        server_name: &str,
        config: &UpstreamConfig,
    ) -> Result<Option<String>, ExecutionFailure> {
        match config.authorization() {
            Authorization::None => Ok(None),
            Authorization::Bearer { token } => Ok(Some(token.expose_secret().to_string())),
            Authorization::Oauth2 { oauth } => {
                let url = config
                    .url
                    .clone()
                    .ok_or_else(|| ExecutionFailure::ExecutionFailed {
                        message: format!("server '{server_name}' uses oauth2 but has no url"),
                    })?;

                let manager = OAuthManager::new(
                    server_name,
                    url,
                    oauth.clone().unwrap_or_default(),
                    TokenStore::new(&self.oauth_root),
                );

                manager
                    .get_access_token_noninteractive()
                    .await
                    .map(Some)
                    .map_err(|_| ExecutionFailure::AuthRequired {
                        server: server_name.to_string(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(json: &str) -> IndexMap<String, UpstreamConfig> {
        let file: please_config::McpServersFile = serde_json::from_str(json).expect("config");
        file.mcp_servers
    }

    fn indexed_tool(server: &str, original: &str) -> ToolDefinition {
        ToolDefinition {
            name: original.to_string(),
            title: None,
            description: String::new(),
            input_schema: serde_json::json!({ "type": "object" }),
            output_schema: None,
            metadata: None,
        }
        .adorn(server)
    }

    fn executor(json: &str) -> (tempfile::TempDir, ToolExecutor) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let executor = ToolExecutor::new(servers(json), tmp.path().to_path_buf());
        (tmp, executor)
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let (_tmp, executor) = executor(r#"{ "mcpServers": {} }"#);

        let err = executor
            .execute(&[], "fs__read_file", None)
            .await
            .expect_err("not found");
        assert_eq!(err.code(), "TOOL_NOT_FOUND");
        assert!(err.hint().expect("hint").contains("please index"));
    }

    #[tokio::test]
    async fn tool_without_provenance_is_metadata_missing() {
        let (_tmp, executor) = executor(r#"{ "mcpServers": {} }"#);
        let tool = ToolDefinition {
            name: "fs__read_file".into(),
            title: None,
            description: String::new(),
            input_schema: serde_json::json!({}),
            output_schema: None,
            metadata: None,
        };

        let err = executor
            .execute(&[tool], "fs__read_file", None)
            .await
            .expect_err("missing metadata");
        assert_eq!(err.code(), "METADATA_MISSING");
    }

    #[tokio::test]
    async fn unconfigured_server_is_server_not_configured() {
        let (_tmp, executor) = executor(r#"{ "mcpServers": {} }"#);
        let tool = indexed_tool("fs", "read_file");

        let err = executor
            .execute(&[tool], "fs__read_file", None)
            .await
            .expect_err("not configured");
        assert_eq!(err.code(), "SERVER_NOT_CONFIGURED");
        assert!(err.hint().expect("hint").contains("please mcp add fs"));
    }

    #[tokio::test]
    async fn oauth_without_session_is_auth_required() {
        let (_tmp, executor) = executor(
            r#"{ "mcpServers": {
                "cal": {
                    "url": "https://mcp.example.invalid/mcp",
                    "authorization": { "type": "oauth2" } } } }"#,
        );
        let tool = indexed_tool("cal", "list_events");

        let err = executor
            .execute(&[tool], "cal__list_events", None)
            .await
            .expect_err("auth required");
        assert_eq!(err.code(), "AUTH_REQUIRED");
        assert!(err.hint().expect("hint").contains("please mcp auth cal"));
    }

    #[tokio::test]
    async fn dead_upstream_is_execution_failed() {
        let (_tmp, executor) = executor(
            r#"{ "mcpServers": { "fs": { "command": "/nonexistent/fs-server" } } }"#,
        );
        let tool = indexed_tool("fs", "read_file");

        let err = executor
            .execute(&[tool], "fs__read_file", None)
            .await
            .expect_err("execution failed");
        assert_eq!(err.code(), "EXECUTION_FAILED");
    }
}
