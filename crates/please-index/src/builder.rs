use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use please_embeddings::EmbeddingProvider;
use please_mcp::ToolDefinition;

use crate::error::IndexError;
use crate::text::searchable_text;
use crate::tokenize::tokenize;
use crate::types::{Bm25Stats, BuildMetadata, INDEX_VERSION, IndexedTool, PersistedIndex};

/// Embeddings are produced this many texts at a time to bound memory
pub const EMBED_BATCH_SIZE: usize = 32;

/// Derive one indexed tool (searchable text + tokens, no embedding yet)
pub fn index_tool(tool: ToolDefinition) -> IndexedTool {
    let searchable_text = searchable_text(&tool);
    let tokens = tokenize(&searchable_text);

    IndexedTool {
        tool,
        searchable_text,
        tokens,
        embedding: None,
    }
}

/// Compute BM25 corpus statistics across the full indexed set
///
/// Document frequency counts each document once per term, so it is derived
/// from each document's unique tokens.
pub fn compute_bm25_stats(tools: &[IndexedTool]) -> Bm25Stats {
    let total_documents = tools.len() as u64;

    let total_tokens: u64 = tools.iter().map(|t| t.tokens.len() as u64).sum();
    let avg_doc_length = if total_documents == 0 {
        0.0
    } else {
        total_tokens as f64 / total_documents as f64
    };

    let mut document_frequencies = std::collections::BTreeMap::new();
    for tool in tools {
        let unique: BTreeSet<&String> = tool.tokens.iter().collect();
        for term in unique {
            *document_frequencies.entry(term.clone()).or_insert(0) += 1;
        }
    }

    Bm25Stats {
        avg_doc_length,
        document_frequencies,
        total_documents,
    }
}

/// Builds a persisted index from discovered tool definitions
pub struct IndexBuilder {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    progress: Option<Box<dyn Fn(usize, usize) + Send + Sync>>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            progress: None,
        }
    }

    /// Attach an embedding provider; without one the index has no vectors
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Per-batch progress callback `(batches_done, batches_total)`
    pub fn on_batch(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Build the full index document
    pub async fn build(
        &self,
        definitions: Vec<ToolDefinition>,
        build_metadata: Option<BuildMetadata>,
    ) -> Result<PersistedIndex, IndexError> {
        let mut tools: Vec<IndexedTool> = definitions.into_iter().map(index_tool).collect();

        if let Some(provider) = &self.provider {
            self.embed_all(&mut tools, provider.as_ref()).await?;
        }

        let has_embeddings = tools.iter().any(|t| t.embedding.is_some());
        let bm25_stats = compute_bm25_stats(&tools);
        let now = Utc::now();

        Ok(PersistedIndex {
            version: INDEX_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            total_tools: tools.len() as u64,
            has_embeddings,
            embedding_model: self
                .provider
                .as_ref()
                .filter(|_| has_embeddings)
                .map(|p| p.tag().to_string()),
            embedding_dimensions: self
                .provider
                .as_ref()
                .filter(|_| has_embeddings)
                .map(|p| p.dimension()),
            bm25_stats,
            tools,
            build_metadata,
        })
    }

    /// Embed searchable text in sequential batches of 32
    ///
    /// A failed batch is logged and skipped; the remaining batches still
    /// run, leaving the failed tools without vectors.
    async fn embed_all(
        &self,
        tools: &mut [IndexedTool],
        provider: &dyn EmbeddingProvider,
    ) -> Result<(), IndexError> {
        provider.initialize().await?;

        let total_batches = tools.len().div_ceil(EMBED_BATCH_SIZE);

        for (batch_index, batch) in tools.chunks_mut(EMBED_BATCH_SIZE).enumerate() {
            let texts: Vec<String> = batch.iter().map(|t| t.searchable_text.clone()).collect();

            match provider.embed_batch(&texts).await {
                Ok(vectors) => {
                    for (tool, vector) in batch.iter_mut().zip(vectors) {
                        tool.embedding = Some(vector);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        batch = batch_index + 1,
                        total = total_batches,
                        error = %e,
                        "embedding batch failed, continuing without vectors"
                    );
                }
            }

            if let Some(progress) = &self.progress {
                progress(batch_index + 1, total_batches);
            }
        }

        Ok(())
    }
}
