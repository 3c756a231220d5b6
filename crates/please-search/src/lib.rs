#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Tool search: regex, BM25, dense-embedding, and hybrid (RRF) strategies
//! behind one contract, with an orchestrator that picks by mode and times
//! each request.

mod bm25;
mod embedding;
mod error;
mod hybrid;
mod orchestrator;
mod regex;
mod strategy;

pub use bm25::Bm25Strategy;
pub use embedding::EmbeddingStrategy;
pub use error::SearchError;
pub use hybrid::{HybridStrategy, RRF_K};
pub use orchestrator::{SearchOrchestrator, SearchRequest, SearchResponse};
pub use self::regex::RegexStrategy;
pub use strategy::{SearchHit, SearchMode, SearchOptions, SearchStrategy};
