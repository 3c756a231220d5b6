#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! The persisted tool index: searchable-text derivation, BM25 corpus
//! statistics, optional embeddings, scope-aware storage, and the staleness
//! detector that drives automatic rebuilds.

mod builder;
mod error;
mod merge;
mod regen;
mod store;
mod text;
mod tokenize;
mod types;

pub use builder::{EMBED_BATCH_SIZE, IndexBuilder, compute_bm25_stats, index_tool};
pub use error::IndexError;
pub use merge::{merge_bm25_stats, merge_indexed_tools};
pub use regen::{CurrentBuildInputs, RegenerationCheck, check_index_regeneration};
pub use store::{IndexMetadata, IndexStore};
pub use text::searchable_text;
pub use tokenize::{STOP_WORDS, tokenize};
pub use types::{
    Bm25Stats, BuildMetadata, CliArgs, INDEX_VERSION, IndexedTool, PersistedIndex,
};
