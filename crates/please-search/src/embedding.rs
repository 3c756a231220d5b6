use std::sync::Arc;

use async_trait::async_trait;
use please_embeddings::EmbeddingProvider;
use please_index::IndexedTool;

use crate::error::SearchError;
use crate::strategy::{SearchHit, SearchMode, SearchOptions, SearchStrategy, finalize_hits};

/// Cosine-similarity search over stored embeddings
///
/// Candidates are restricted to documents that carry a vector; an index with
/// none fails fast. Similarity maps to `[0, 1]` via `(cos + 1) / 2`.
pub struct EmbeddingStrategy {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingStrategy {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

/// Cosine of two vectors; zero-norm vectors yield 0
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SearchStrategy for EmbeddingStrategy {
    fn mode(&self) -> SearchMode {
        SearchMode::Embedding
    }

    async fn initialize(&self) -> Result<(), SearchError> {
        self.provider.initialize().await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        tools: &[IndexedTool],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let candidates: Vec<(&IndexedTool, &Vec<f32>)> = tools
            .iter()
            .filter_map(|tool| tool.embedding.as_ref().map(|e| (tool, e)))
            .collect();

        if candidates.is_empty() {
            return Err(SearchError::NoEmbeddings);
        }

        // Lazy initialization so construction stays cheap
        self.provider.initialize().await?;
        let query_vector = self.provider.embed(query).await?;

        if let Some((_, stored)) = candidates
            .iter()
            .find(|(_, e)| e.len() != query_vector.len())
        {
            return Err(SearchError::DimensionMismatch {
                query: query_vector.len(),
                stored: stored.len(),
            });
        }

        let hits = candidates
            .into_iter()
            .map(|(tool, embedding)| {
                let score = (cosine(&query_vector, embedding) + 1.0) / 2.0;
                SearchHit::from_tool(tool, score, SearchMode::Embedding)
            })
            .collect();

        Ok(finalize_hits(hits, options))
    }

    async fn dispose(&self) {
        self.provider.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use please_embeddings::EmbeddingError;
    use please_index::index_tool;
    use please_mcp::ToolDefinition;

    use super::*;

    /// Maps known texts to fixed vectors
    struct FixtureProvider;

    #[async_trait]
    impl EmbeddingProvider for FixtureProvider {
        fn tag(&self) -> &str {
            "test:fixture"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn initialize(&self) -> Result<(), EmbeddingError> {
            Ok(())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(match text {
                "north" => vec![0.0, 1.0],
                "east" => vec![1.0, 0.0],
                _ => vec![0.707, 0.707],
            })
        }

        async fn dispose(&self) {}
    }

    fn tool_with_embedding(name: &str, embedding: Option<Vec<f32>>) -> IndexedTool {
        let mut tool = index_tool(ToolDefinition {
            name: name.to_string(),
            title: None,
            description: format!("{name} tool"),
            input_schema: serde_json::json!({ "type": "object" }),
            output_schema: None,
            metadata: None,
        });
        tool.embedding = embedding;
        tool
    }

    fn strategy() -> EmbeddingStrategy {
        EmbeddingStrategy::new(Arc::new(FixtureProvider))
    }

    #[tokio::test]
    async fn closest_vector_ranks_first() {
        let tools = vec![
            tool_with_embedding("points_north", Some(vec![0.0, 1.0])),
            tool_with_embedding("points_east", Some(vec![1.0, 0.0])),
            tool_with_embedding("points_south", Some(vec![0.0, -1.0])),
        ];

        let hits = strategy()
            .search("north", &tools, &SearchOptions::default())
            .await
            .expect("search");

        assert_eq!(hits[0].name, "points_north");
        assert!((hits[0].score - 1.0).abs() < 1e-6);

        // Opposite direction maps to 0 under (cos + 1) / 2
        let south = hits.iter().find(|h| h.name == "points_south").expect("south");
        assert!(south.score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn index_without_vectors_fails_fast() {
        let tools = vec![tool_with_embedding("plain", None)];

        let err = strategy()
            .search("north", &tools, &SearchOptions::default())
            .await
            .expect_err("no embeddings");

        assert!(err.to_string().contains("No tools with embeddings"));
    }

    #[tokio::test]
    async fn unembedded_documents_are_not_candidates() {
        let tools = vec![
            tool_with_embedding("with_vector", Some(vec![0.0, 1.0])),
            tool_with_embedding("without_vector", None),
        ];

        let hits = strategy()
            .search("north", &tools, &SearchOptions::default())
            .await
            .expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "with_vector");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_fatal() {
        let tools = vec![tool_with_embedding("odd", Some(vec![1.0, 0.0, 0.0]))];

        let err = strategy()
            .search("north", &tools, &SearchOptions::default())
            .await
            .expect_err("mismatch");

        assert!(matches!(err, SearchError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn zero_norm_vector_scores_midpoint() {
        let tools = vec![tool_with_embedding("zeroed", Some(vec![0.0, 0.0]))];

        let hits = strategy()
            .search("north", &tools, &SearchOptions::default())
            .await
            .expect("search");

        // Similarity 0 maps to 0.5
        assert!((hits[0].score - 0.5).abs() < 1e-6);
    }
}
