use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::scope::{ConfigScope, IndexScope};

/// Name of the per-directory configuration folder
const PLEASE_DIR: &str = ".please";

/// Resolved filesystem roots for all gateway state
///
/// Every path the gateway touches is derived from the pair (home, cwd) so
/// tests can point both at temporary directories.
#[derive(Debug, Clone)]
pub struct PleaseDirs {
    home: PathBuf,
    cwd: PathBuf,
}

impl PleaseDirs {
    /// Discover roots from the environment
    pub fn discover() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        let cwd = std::env::current_dir().map_err(ConfigError::NoWorkingDir)?;
        Ok(Self { home, cwd })
    }

    /// Build from explicit roots
    pub fn with_roots(home: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            cwd: cwd.into(),
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Config file path for a scope
    pub fn config_path(&self, scope: ConfigScope) -> PathBuf {
        match scope {
            ConfigScope::User => self.home.join(PLEASE_DIR).join("mcp.json"),
            ConfigScope::Project => self.cwd.join(PLEASE_DIR).join("mcp.json"),
            ConfigScope::Local => self.cwd.join(PLEASE_DIR).join("mcp.local.json"),
        }
    }

    /// Persisted index path for a scope
    ///
    /// `All` has no file of its own; it is served by merging the project and
    /// user indexes, so it resolves to the project path for writes.
    pub fn index_path(&self, scope: IndexScope) -> PathBuf {
        let root = match scope {
            IndexScope::User => &self.home,
            IndexScope::Project | IndexScope::All => &self.cwd,
        };
        root.join(PLEASE_DIR).join("mcp").join("index.json")
    }

    /// Root directory for OAuth sessions and client registrations
    pub fn oauth_root(&self) -> PathBuf {
        self.home.join(PLEASE_DIR).join("oauth")
    }

    /// Root directory for local embedding models
    ///
    /// Overridable via `PLEASE_MODEL_DIR`.
    pub fn model_root(&self) -> PathBuf {
        std::env::var_os("PLEASE_MODEL_DIR")
            .map_or_else(|| self.home.join(PLEASE_DIR).join("models"), PathBuf::from)
    }

    /// Ensure `.please/.gitignore` ignores the local config file
    ///
    /// Called whenever the local scope is written so the per-checkout file
    /// never lands in version control. Appends once; existing entries are
    /// left untouched.
    pub fn ensure_local_gitignore(&self) -> Result<(), ConfigError> {
        let dir = self.cwd.join(PLEASE_DIR);
        let path = dir.join(".gitignore");
        let entry = "mcp.local.json";

        let existing = std::fs::read_to_string(&path).unwrap_or_default();
        if existing.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }

        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Write {
            path: dir.clone(),
            source,
        })?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;

        let needs_newline = !existing.is_empty() && !existing.ends_with('\n');
        let line = if needs_newline {
            format!("\n{entry}\n")
        } else {
            format!("{entry}\n")
        };
        file.write_all(line.as_bytes())
            .map_err(|source| ConfigError::Write { path, source })?;

        Ok(())
    }
}
