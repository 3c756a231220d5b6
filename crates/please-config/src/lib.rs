#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Scoped configuration for the gateway: three JSON files (user, project,
//! local), a merge policy, and content fingerprints that drive index
//! invalidation.

mod error;
mod fingerprint;
mod paths;
mod resolver;
mod scope;
mod servers;

pub use error::ConfigError;
pub use fingerprint::{ConfigFingerprint, fingerprint_file};
pub use paths::PleaseDirs;
pub use resolver::{ConfigResolver, ScopeFingerprints};
pub use scope::{ConfigScope, IndexScope};
pub use servers::{
    Authorization, McpServersFile, OauthOptions, ServerTransport, TransportKind, UpstreamConfig,
};
