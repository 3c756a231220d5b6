use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fingerprint of one scope's config file at a point in time
///
/// Either the file does not exist, or it exists with a SHA-256 digest of its
/// exact bytes. Equality of fingerprints is what the regeneration detector
/// compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFingerprint {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ConfigFingerprint {
    pub fn absent() -> Self {
        Self {
            exists: false,
            hash: None,
        }
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            exists: true,
            hash: Some(format!("{:x}", hasher.finalize())),
        }
    }
}

/// Fingerprint a config file by content
///
/// An unreadable file counts as absent, matching the resolver's treatment
/// of unparseable files.
pub fn fingerprint_file(path: &Path) -> ConfigFingerprint {
    match std::fs::read(path) {
        Ok(bytes) => ConfigFingerprint::of_bytes(&bytes),
        Err(_) => ConfigFingerprint::absent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_identically() {
        let a = ConfigFingerprint::of_bytes(b"{\"mcpServers\":{}}");
        let b = ConfigFingerprint::of_bytes(b"{\"mcpServers\":{}}");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_bytes_hash_distinctly() {
        let a = ConfigFingerprint::of_bytes(b"{}");
        let b = ConfigFingerprint::of_bytes(b"{ }");
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn missing_file_is_absent() {
        let fp = fingerprint_file(Path::new("/nonexistent/mcp.json"));
        assert!(!fp.exists);
        assert!(fp.hash.is_none());
    }

    #[test]
    fn file_fingerprint_matches_byte_fingerprint() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("mcp.json");
        std::fs::write(&path, b"{\"mcpServers\":{}}").expect("write");

        assert_eq!(
            fingerprint_file(&path),
            ConfigFingerprint::of_bytes(b"{\"mcpServers\":{}}")
        );
    }
}
