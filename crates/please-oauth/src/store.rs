use std::path::{Path, PathBuf};

use chrono::Utc;
use md5::{Digest, Md5};

use crate::error::AuthError;
use crate::session::{ClientInfo, OAuthSession, TokenResponse};

/// Filesystem persistence for OAuth sessions and client registrations
///
/// Two files per upstream URL under the store root: `tokens/<digest>.json`
/// and `clients/<digest>.json`. The digest only needs to be unique, not
/// cryptographic. Directories are created 0700 and files 0600 so other
/// local users cannot read tokens.
pub struct TokenStore {
    root: PathBuf,
}

impl TokenStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First 12 hex characters of MD5 over the server URL
    fn digest(url: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(url.as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        hex[..12].to_string()
    }

    fn session_path(&self, url: &str) -> PathBuf {
        self.root
            .join("tokens")
            .join(format!("{}.json", Self::digest(url)))
    }

    fn client_path(&self, url: &str) -> PathBuf {
        self.root
            .join("clients")
            .join(format!("{}.json", Self::digest(url)))
    }

    /// Load a stored session
    ///
    /// Expired sessions are returned only when `include_expired` is set
    /// (the refresh path needs them for their refresh token). Sessions
    /// holding neither an access token nor a refresh token are treated as
    /// absent.
    pub fn load_session(
        &self,
        url: &str,
        include_expired: bool,
    ) -> Result<Option<OAuthSession>, AuthError> {
        let Some(session) = read_json::<OAuthSession>(&self.session_path(url))? else {
            return Ok(None);
        };

        if !session.is_usable() {
            return Ok(None);
        }

        if !include_expired && session.is_expired(Utc::now()) {
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub fn save_session(&self, url: &str, session: &OAuthSession) -> Result<(), AuthError> {
        write_json(&self.session_path(url), session)
    }

    /// Apply a token response on top of the stored session
    ///
    /// Used after a refresh grant: the new tokens replace the old ones while
    /// an omitted refresh token is carried forward.
    pub fn update_tokens(
        &self,
        url: &str,
        response: TokenResponse,
    ) -> Result<OAuthSession, AuthError> {
        let now = Utc::now();
        let session = match self.load_session(url, true)? {
            Some(existing) => existing.refreshed_with(response, now),
            None => OAuthSession::from_response(response, now),
        };
        self.save_session(url, &session)?;
        Ok(session)
    }

    pub fn clear_session(&self, url: &str) -> Result<(), AuthError> {
        let path = self.session_path(url);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AuthError::Store { path, source }),
        }
    }

    pub fn load_client_info(&self, url: &str) -> Result<Option<ClientInfo>, AuthError> {
        read_json(&self.client_path(url))
    }

    pub fn save_client_info(&self, url: &str, info: &ClientInfo) -> Result<(), AuthError> {
        write_json(&self.client_path(url), info)
    }

    /// A non-expired session exists
    pub fn has_valid_session(&self, url: &str) -> bool {
        matches!(self.load_session(url, false), Ok(Some(_)))
    }

    /// A session exists, possibly expired but refreshable
    pub fn has_session(&self, url: &str) -> bool {
        matches!(self.load_session(url, true), Ok(Some(_)))
    }

    /// The stored session is within the proactive refresh window
    pub fn needs_refresh(&self, url: &str) -> bool {
        matches!(
            self.load_session(url, true),
            Ok(Some(session)) if session.needs_refresh(Utc::now())
        )
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, AuthError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AuthError::Store {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| AuthError::CorruptStore {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), AuthError> {
    let dir = path.parent().expect("store paths always have a parent");
    std::fs::create_dir_all(dir).map_err(|source| AuthError::Store {
        path: dir.to_path_buf(),
        source,
    })?;
    set_mode(dir, 0o700)?;

    let body = serde_json::to_vec_pretty(value).expect("store types serialize");
    std::fs::write(path, body).map_err(|source| AuthError::Store {
        path: path.to_path_buf(),
        source,
    })?;
    set_mode(path, 0o600)?;

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), AuthError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|source| {
        AuthError::Store {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), AuthError> {
    Ok(())
}
