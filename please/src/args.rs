use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

/// MCP aggregation gateway: index upstream tools, search them, execute them
#[derive(Debug, Parser)]
#[command(name = "please", version, about = "MCP aggregation gateway")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover upstream tools and rebuild the scoped index
    Index(IndexArgs),
    /// Search the indexed tools
    Search(SearchArgs),
    /// Execute an upstream tool by its qualified name
    Call(CallArgs),
    /// Start the gateway MCP server
    Serve(ServeArgs),
    /// Manage upstream server configs and OAuth sessions
    Mcp {
        #[command(subcommand)]
        command: McpCommand,
    },
    /// Write this gateway into an IDE's MCP configuration
    Install(InstallArgs),
    /// Direct execution: `please <server__tool> --args '<json>'`
    #[command(external_subcommand)]
    Direct(Vec<String>),
}

#[derive(Debug, ClapArgs)]
pub struct IndexArgs {
    /// Restrict discovery to these upstream names
    pub sources: Vec<String>,

    /// Write the index somewhere other than the scope path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Embedding provider tag (location:model)
    #[arg(long)]
    pub provider: Option<String>,

    /// Override the model part of the provider tag
    #[arg(long)]
    pub model: Option<String>,

    /// Quantization for local models
    #[arg(long, default_value = "fp32")]
    pub dtype: String,

    /// Build a text-only index without embeddings
    #[arg(long)]
    pub no_embeddings: bool,

    /// Rebuild even when the index is up to date
    #[arg(long)]
    pub force: bool,

    /// Per-upstream connection timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Comma-separated upstream names to skip
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Which index to build
    #[arg(long, default_value = "project")]
    pub scope: BuildScope,
}

#[derive(Debug, ClapArgs)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Search mode
    #[arg(long)]
    pub mode: Option<String>,

    /// Maximum number of results
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Minimum score in [0,1]
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Search an explicit index file instead of the scope paths
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: SearchFormat,

    /// Embedding provider tag for embedding/hybrid modes
    #[arg(long)]
    pub provider: Option<String>,

    /// Which indexes to search
    #[arg(long, default_value = "all")]
    pub scope: ServeScope,
}

#[derive(Debug, Parser)]
#[command(name = "call", about = "Execute an upstream tool")]
pub struct CallArgs {
    /// Qualified tool name (server__tool)
    pub tool: String,

    /// JSON arguments object; read from stdin when omitted
    #[arg(long)]
    pub args: Option<String>,

    /// Use an explicit index file
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: CallFormat,
}

#[derive(Debug, ClapArgs)]
pub struct ServeArgs {
    /// Wire transport for the gateway itself
    #[arg(long, default_value = "stdio")]
    pub transport: ServeTransport,

    /// Listen port for http transport
    #[arg(long, default_value_t = 8974)]
    pub port: u16,

    /// Serve an explicit index file instead of the scope paths
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Default search mode
    #[arg(long)]
    pub mode: Option<String>,

    /// Embedding provider tag
    #[arg(long)]
    pub provider: Option<String>,

    /// Quantization for local models
    #[arg(long, default_value = "fp32")]
    pub dtype: String,

    /// Which indexes to serve
    #[arg(long, default_value = "all")]
    pub scope: ServeScope,
}

#[derive(Debug, Subcommand)]
pub enum McpCommand {
    /// Add or replace an upstream server
    Add(McpAddArgs),
    /// Remove an upstream server
    Remove {
        name: String,
        #[arg(long, default_value = "local")]
        scope: ConfigScopeArg,
    },
    /// List configured upstream servers
    List,
    /// Show one upstream server's configuration
    Get { name: String },
    /// Run the OAuth sign-in flow for an upstream
    Auth {
        name: String,
        /// Clear the stored session instead of signing in
        #[arg(long)]
        revoke: bool,
    },
}

#[derive(Debug, ClapArgs)]
pub struct McpAddArgs {
    /// Server name
    pub name: String,

    /// Command for stdio transport
    #[arg(long)]
    pub command: Option<String>,

    /// Arguments for the stdio command
    #[arg(long = "arg")]
    pub args: Vec<String>,

    /// KEY=VALUE environment overlay entries
    #[arg(long = "env")]
    pub env: Vec<String>,

    /// Endpoint for http/sse transport
    #[arg(long)]
    pub url: Option<String>,

    /// Explicit transport override
    #[arg(long)]
    pub transport: Option<TransportArg>,

    /// Authorization mode
    #[arg(long, default_value = "none")]
    pub auth: AuthArg,

    /// Bearer token (auth=bearer)
    #[arg(long)]
    pub token: Option<String>,

    /// OAuth scopes to request (auth=oauth2)
    #[arg(long = "oauth-scope")]
    pub oauth_scopes: Vec<String>,

    /// Config scope to write
    #[arg(long, default_value = "local")]
    pub scope: ConfigScopeArg,
}

#[derive(Debug, ClapArgs)]
pub struct InstallArgs {
    /// IDE whose MCP configuration receives the gateway entry
    #[arg(long)]
    pub ide: Ide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildScope {
    Project,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServeScope {
    Project,
    User,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServeTransport {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchFormat {
    Table,
    Json,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CallFormat {
    Json,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigScopeArg {
    Local,
    Project,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    None,
    Bearer,
    Oauth2,
}

/// Supported IDE targets for `install`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Ide {
    /// Claude Code (`<cwd>/.mcp.json`)
    Claude,
    /// Cursor (`~/.cursor/mcp.json`)
    Cursor,
    /// VS Code (`<cwd>/.vscode/mcp.json`)
    Vscode,
}

impl From<BuildScope> for please_config::IndexScope {
    fn from(scope: BuildScope) -> Self {
        match scope {
            BuildScope::Project => Self::Project,
            BuildScope::User => Self::User,
        }
    }
}

impl From<ServeScope> for please_config::IndexScope {
    fn from(scope: ServeScope) -> Self {
        match scope {
            ServeScope::Project => Self::Project,
            ServeScope::User => Self::User,
            ServeScope::All => Self::All,
        }
    }
}

impl From<ConfigScopeArg> for please_config::ConfigScope {
    fn from(scope: ConfigScopeArg) -> Self {
        match scope {
            ConfigScopeArg::Local => Self::Local,
            ConfigScopeArg::Project => Self::Project,
            ConfigScopeArg::User => Self::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn exclude_list_splits_on_commas() {
        let args = Args::parse_from(["please", "index", "--exclude", "a,b,c"]);
        match args.command {
            Command::Index(index) => assert_eq!(index.exclude, vec!["a", "b", "c"]),
            other => panic!("expected index, got {other:?}"),
        }
    }

    #[test]
    fn direct_invocation_falls_through_to_external() {
        let args = Args::parse_from(["please", "fs__read_file", "--args", "{}"]);
        match args.command {
            Command::Direct(rest) => {
                assert_eq!(rest[0], "fs__read_file");
                assert_eq!(rest[1], "--args");
            }
            other => panic!("expected direct, got {other:?}"),
        }
    }

    #[test]
    fn call_args_reparse_from_direct_form() {
        let parsed =
            CallArgs::try_parse_from(["call", "fs__read_file", "--args", r#"{"path":"x"}"#])
                .expect("parse");
        assert_eq!(parsed.tool, "fs__read_file");
        assert_eq!(parsed.args.as_deref(), Some(r#"{"path":"x"}"#));
    }
}
