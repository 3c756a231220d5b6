use thiserror::Error;

/// Search failures surfaced to the caller
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding or hybrid mode requested against a vector-less index
    #[error(
        "No tools with embeddings in the index; rebuild with `please index` and an embedding provider"
    )]
    NoEmbeddings,

    /// Query vector width differs from the stored vectors
    #[error("query embedding has {query} dimensions but the index stores {stored}")]
    DimensionMismatch { query: usize, stored: usize },

    /// Requested mode has no registered strategy
    #[error("unknown search mode '{0}'")]
    UnknownMode(String),

    /// One side of a hybrid search failed
    #[error("hybrid {side} sub-search failed: {source}")]
    HybridSide {
        side: &'static str,
        #[source]
        source: Box<SearchError>,
    },

    /// Embedding provider failure
    #[error(transparent)]
    Embedding(#[from] please_embeddings::EmbeddingError),
}
