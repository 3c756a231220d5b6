use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use please_config::ScopeFingerprints;
use please_mcp::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Current index document version; the load gate compares majors only
pub const INDEX_VERSION: &str = "1.0.0";

/// A tool definition with its precomputed search derivatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTool {
    pub tool: ToolDefinition,
    /// Deterministic flattening of the tool's descriptive surface
    pub searchable_text: String,
    /// Stop-worded token sequence; order preserved for term frequencies
    pub tokens: Vec<String>,
    /// Unit-norm vector of the index's declared dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// BM25 corpus statistics, re-derivable from the tools array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Stats {
    pub avg_doc_length: f64,
    /// Per-term count of documents containing the term
    pub document_frequencies: BTreeMap<String, u64>,
    pub total_documents: u64,
}

/// CLI flag values that went into a build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Everything that determines whether an index is stale
///
/// An index without build metadata predates this format and is
/// unconditionally rebuildable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetadata {
    pub cli_version: String,
    pub cli_args: CliArgs,
    pub config_fingerprints: ScopeFingerprints,
}

/// The self-describing persisted index document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedIndex {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_tools: u64,
    pub has_embeddings: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<usize>,
    pub bm25_stats: Bm25Stats,
    pub tools: Vec<IndexedTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_metadata: Option<BuildMetadata>,
}

impl PersistedIndex {
    /// An empty index so a fresh deployment serves empty results instead of
    /// crashing
    pub fn empty(build_metadata: Option<BuildMetadata>) -> Self {
        let now = Utc::now();
        Self {
            version: INDEX_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            total_tools: 0,
            has_embeddings: false,
            embedding_model: None,
            embedding_dimensions: None,
            bm25_stats: Bm25Stats::default(),
            tools: Vec::new(),
            build_metadata,
        }
    }
}
