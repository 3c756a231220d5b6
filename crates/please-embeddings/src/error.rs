use thiserror::Error;

/// Embedding provider errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No factory registered for the requested tag
    #[error("unknown embedding provider '{tag}'")]
    UnknownProvider { tag: String },

    /// Remote provider is missing its API key
    #[error("{provider} requires the {var} environment variable")]
    MissingCredentials {
        provider: String,
        var: &'static str,
    },

    /// Local model files are not present on disk
    #[error("model file not found at {path}; download the model there first")]
    ModelNotFound { path: std::path::PathBuf },

    /// Tokenizer failed to load or encode
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// ONNX session construction or inference failed
    #[error("inference failed: {0}")]
    Inference(String),

    /// Remote API returned a non-success status
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Request never reached the remote API
    #[error("connection to {provider} failed: {source}")]
    Connection {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// Provider returned a vector of the wrong width
    #[error("provider returned {got}-dim vector, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}
