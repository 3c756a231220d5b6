use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fingerprint::{ConfigFingerprint, fingerprint_file};
use crate::paths::PleaseDirs;
use crate::scope::{ConfigScope, IndexScope};
use crate::servers::{McpServersFile, UpstreamConfig};

/// Fingerprints for all three config scopes, captured together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFingerprints {
    pub user: ConfigFingerprint,
    pub project: ConfigFingerprint,
    pub local: ConfigFingerprint,
}

impl ScopeFingerprints {
    pub fn get(&self, scope: ConfigScope) -> &ConfigFingerprint {
        match scope {
            ConfigScope::User => &self.user,
            ConfigScope::Project => &self.project,
            ConfigScope::Local => &self.local,
        }
    }
}

/// Loads and merges the scoped config files
pub struct ConfigResolver {
    dirs: PleaseDirs,
}

impl ConfigResolver {
    pub fn new(dirs: PleaseDirs) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &PleaseDirs {
        &self.dirs
    }

    /// Load a single scope's file
    ///
    /// A missing file yields `None`. A file that exists but fails to parse
    /// also yields `None`: the damage surfaces later as missing servers
    /// rather than taking the whole gateway down.
    pub fn load_scope(&self, scope: ConfigScope) -> Option<McpServersFile> {
        let path = self.dirs.config_path(scope);
        let raw = std::fs::read_to_string(&path).ok()?;

        match serde_json::from_str(&raw) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(
                    scope = %scope,
                    path = %path.display(),
                    error = %e,
                    "config file is not valid JSON, treating as absent"
                );
                None
            }
        }
    }

    /// Merged upstream map for an index scope
    ///
    /// Scopes merge in `user → project → local` order; a later scope wins on
    /// server-name collision. The user index scope sees the user file only.
    pub fn merged(&self, scope: IndexScope) -> IndexMap<String, UpstreamConfig> {
        let mut merged = IndexMap::new();

        for &config_scope in scope.config_scopes() {
            if let Some(file) = self.load_scope(config_scope) {
                for (name, server) in file.mcp_servers {
                    merged.insert(name, server);
                }
            }
        }

        merged
    }

    /// Look up one server across the merged view
    pub fn find_server(
        &self,
        scope: IndexScope,
        name: &str,
    ) -> Result<UpstreamConfig, ConfigError> {
        self.merged(scope)
            .shift_remove(name)
            .ok_or_else(|| ConfigError::UnknownServer {
                name: name.to_string(),
            })
    }

    /// Fingerprint all three scopes as they exist right now
    pub fn fingerprints(&self) -> ScopeFingerprints {
        ScopeFingerprints {
            user: fingerprint_file(&self.dirs.config_path(ConfigScope::User)),
            project: fingerprint_file(&self.dirs.config_path(ConfigScope::Project)),
            local: fingerprint_file(&self.dirs.config_path(ConfigScope::Local)),
        }
    }
}
