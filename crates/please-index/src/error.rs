use std::path::PathBuf;

use thiserror::Error;

/// Index persistence and build errors
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index file does not exist at the expected path
    #[error("index not found at {path}; run `please index` to build it")]
    NotFound { path: PathBuf },

    /// Filesystem failure reading or writing the index
    #[error("index I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Index file exists but is not a valid index document
    #[error("index at {path} is corrupted: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Index was written by an incompatible major version
    #[error("index version {found} is incompatible with {expected} (major mismatch)")]
    VersionMismatch { found: String, expected: String },

    /// Embedding provider failed while building
    #[error(transparent)]
    Embedding(#[from] please_embeddings::EmbeddingError),
}
