use std::collections::HashMap;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// On-disk shape of a scope's config file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServersFile {
    /// Upstream server configurations keyed by name
    #[serde(default)]
    pub mcp_servers: IndexMap<String, UpstreamConfig>,
}

/// Configuration for a single upstream MCP server
///
/// The file format is flat: stdio servers carry `command`/`args`/`env`,
/// remote servers carry `url`. `transport` is optional and otherwise
/// inferred from which fields are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Command to spawn for stdio transport
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments for the spawned command
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overlay for the spawned command; null values are dropped
    #[serde(default)]
    pub env: HashMap<String, Option<String>>,
    /// Endpoint for http/sse transport
    #[serde(default)]
    pub url: Option<Url>,
    /// Explicit transport override
    #[serde(default)]
    pub transport: Option<TransportKind>,
    /// Upstream authentication
    #[serde(default)]
    pub authorization: Option<Authorization>,
}

/// Declared transport kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

/// Upstream authentication modes
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Authorization {
    /// No credentials attached
    None,
    /// Static bearer token
    Bearer { token: SecretString },
    /// OAuth 2.1 authorization-code flow with PKCE
    Oauth2 {
        #[serde(default)]
        oauth: Option<OauthOptions>,
    },
}

/// Optional OAuth parameters for an upstream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OauthOptions {
    /// Scopes to request during authorization
    #[serde(default)]
    pub scopes: Vec<String>,
    /// RFC 8707 resource indicator
    #[serde(default)]
    pub resource: Option<String>,
    /// Authorization server override, skipping metadata discovery
    #[serde(default)]
    pub authorization_server: Option<Url>,
}

/// Transport resolved from an upstream config
#[derive(Debug, Clone)]
pub enum ServerTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    StreamableHttp {
        url: Url,
    },
    Sse {
        url: Url,
    },
}

impl UpstreamConfig {
    /// Resolve the effective transport
    ///
    /// A `url` implies streamable HTTP unless `transport` says otherwise;
    /// a `command` implies stdio. A server with neither is unusable.
    pub fn resolve_transport(&self, name: &str) -> Result<ServerTransport, ConfigError> {
        let kind = match self.transport {
            Some(kind) => kind,
            None if self.url.is_some() => TransportKind::Http,
            None if self.command.is_some() => TransportKind::Stdio,
            None => {
                return Err(ConfigError::MissingEndpoint {
                    server: name.to_string(),
                });
            }
        };

        match kind {
            TransportKind::Stdio => {
                let command = self.command.clone().ok_or(ConfigError::TransportMismatch {
                    server: name.to_string(),
                    transport: "stdio",
                    missing: "a command",
                })?;
                Ok(ServerTransport::Stdio {
                    command,
                    args: self.args.clone(),
                    env: self.env_overlay(),
                })
            }
            TransportKind::Http => {
                let url = self.url.clone().ok_or(ConfigError::TransportMismatch {
                    server: name.to_string(),
                    transport: "http",
                    missing: "a url",
                })?;
                Ok(ServerTransport::StreamableHttp { url })
            }
            TransportKind::Sse => {
                let url = self.url.clone().ok_or(ConfigError::TransportMismatch {
                    server: name.to_string(),
                    transport: "sse",
                    missing: "a url",
                })?;
                Ok(ServerTransport::Sse { url })
            }
        }
    }

    /// Environment overlay with null entries filtered out
    pub fn env_overlay(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Effective authorization, defaulting to none
    pub fn authorization(&self) -> &Authorization {
        self.authorization.as_ref().unwrap_or(&Authorization::None)
    }
}
