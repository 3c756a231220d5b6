use thiserror::Error;

/// Gateway serving errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Requested tool is not in the merged index
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// Index could not be loaded
    #[error(transparent)]
    Index(#[from] please_index::IndexError),

    /// Search request failed
    #[error(transparent)]
    Search(#[from] please_search::SearchError),
}
