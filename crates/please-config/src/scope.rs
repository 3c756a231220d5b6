use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The three configuration file scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    /// `$HOME/.please/mcp.json` — shared across projects
    User,
    /// `<cwd>/.please/mcp.json` — version-controlled
    Project,
    /// `<cwd>/.please/mcp.local.json` — per-checkout, gitignored
    Local,
}

impl ConfigScope {
    /// All scopes in merge order (lowest precedence first)
    pub const MERGE_ORDER: [Self; 3] = [Self::User, Self::Project, Self::Local];

    /// Key used for this scope in persisted build metadata
    pub fn key(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ConfigScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "project" => Ok(Self::Project),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::UnknownScope(other.to_string())),
        }
    }
}

/// Which index a command targets
///
/// A user-scoped index is built from the user config alone; a project-scoped
/// index reflects the full federation a developer has configured locally
/// (user + project + local). `All` is a serving-side view that merges both
/// persisted indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope {
    Project,
    User,
    All,
}

impl IndexScope {
    /// Config scopes visible to a build at this index scope
    pub fn config_scopes(self) -> &'static [ConfigScope] {
        match self {
            Self::User => &[ConfigScope::User],
            Self::Project | Self::All => {
                &[ConfigScope::User, ConfigScope::Project, ConfigScope::Local]
            }
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::User => "user",
            Self::All => "all",
        }
    }
}

impl fmt::Display for IndexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for IndexScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            "all" => Ok(Self::All),
            other => Err(ConfigError::UnknownScope(other.to_string())),
        }
    }
}
