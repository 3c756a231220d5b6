use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use please_index::IndexedTool;

use crate::bm25::Bm25Strategy;
use crate::embedding::EmbeddingStrategy;
use crate::error::SearchError;
use crate::strategy::{SearchHit, SearchMode, SearchOptions, SearchStrategy, finalize_hits, round3};

/// Reciprocal Rank Fusion constant
pub const RRF_K: f32 = 60.0;

/// How much wider the sub-searches cast their net than the final topK
const TOP_K_MULTIPLIER: usize = 3;

/// BM25 + embedding fusion via Reciprocal Rank Fusion
///
/// Both sub-searches run in parallel over the same document set with an
/// expanded topK and no threshold, so fusion has enough candidates. Fused
/// scores are normalized against the single best fused score.
pub struct HybridStrategy {
    bm25: Arc<Bm25Strategy>,
    embedding: Arc<EmbeddingStrategy>,
    k: f32,
}

impl HybridStrategy {
    pub fn new(bm25: Arc<Bm25Strategy>, embedding: Arc<EmbeddingStrategy>) -> Self {
        Self {
            bm25,
            embedding,
            k: RRF_K,
        }
    }

    pub fn with_k(mut self, k: f32) -> Self {
        self.k = k;
        self
    }
}

/// Accumulate `1 / (k + rank + 1)` per ranked list into fused scores
///
/// A document present in both lists collects both contributions; rank 0 in
/// both yields `2 / (k + 1)` before normalization.
fn rrf_fuse<'a>(lists: &'a [Vec<SearchHit>], k: f32) -> Vec<(&'a SearchHit, f32)> {
    let mut scores: HashMap<&str, f32> = HashMap::new();
    let mut order: Vec<&SearchHit> = Vec::new();

    for list in lists {
        for (rank, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32 + 1.0);
            match scores.get_mut(hit.name.as_str()) {
                Some(existing) => *existing += contribution,
                None => {
                    scores.insert(&hit.name, contribution);
                    order.push(hit);
                }
            }
        }
    }

    order
        .into_iter()
        .map(|hit| (hit, scores[hit.name.as_str()]))
        .collect()
}

#[async_trait]
impl SearchStrategy for HybridStrategy {
    fn mode(&self) -> SearchMode {
        SearchMode::Hybrid
    }

    async fn initialize(&self) -> Result<(), SearchError> {
        self.bm25.initialize().await?;
        self.embedding.initialize().await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        tools: &[IndexedTool],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if !tools.iter().any(|t| t.embedding.is_some()) {
            return Err(SearchError::NoEmbeddings);
        }

        let expanded = SearchOptions {
            top_k: options.top_k * TOP_K_MULTIPLIER,
            threshold: Some(0.0),
        };

        let (bm25_result, embedding_result) = tokio::join!(
            self.bm25.search(query, tools, &expanded),
            self.embedding.search(query, tools, &expanded),
        );

        let bm25_hits = bm25_result.map_err(|e| SearchError::HybridSide {
            side: "bm25",
            source: Box::new(e),
        })?;
        let embedding_hits = embedding_result.map_err(|e| SearchError::HybridSide {
            side: "embedding",
            source: Box::new(e),
        })?;

        let lists = [bm25_hits, embedding_hits];
        let fused = rrf_fuse(&lists, self.k);

        let max = fused
            .iter()
            .map(|(_, score)| *score)
            .fold(f32::MIN, f32::max);

        let hits: Vec<SearchHit> = fused
            .into_iter()
            .map(|(hit, score)| SearchHit {
                name: hit.name.clone(),
                title: hit.title.clone(),
                description: hit.description.clone(),
                score: round3(score / max),
                match_type: SearchMode::Hybrid,
            })
            .collect();

        Ok(finalize_hits(hits, options))
    }

    async fn dispose(&self) {
        self.bm25.dispose().await;
        self.embedding.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use please_embeddings::{EmbeddingError, EmbeddingProvider};
    use please_index::index_tool;
    use please_mcp::ToolDefinition;

    use super::*;

    fn hit(name: &str) -> SearchHit {
        SearchHit {
            name: name.to_string(),
            title: None,
            description: String::new(),
            score: 0.0,
            match_type: SearchMode::Bm25,
        }
    }

    #[test]
    fn rank_zero_in_both_lists_scores_two_over_k_plus_one() {
        let lists = [vec![hit("a"), hit("b")], vec![hit("a"), hit("c")]];
        let fused = rrf_fuse(&lists, RRF_K);

        let a = fused.iter().find(|(h, _)| h.name == "a").expect("a");
        assert!((a.1 - 2.0 / (RRF_K + 1.0)).abs() < 1e-6);

        let b = fused.iter().find(|(h, _)| h.name == "b").expect("b");
        assert!((b.1 - 1.0 / (RRF_K + 2.0)).abs() < 1e-6);
    }

    /// Ranks documents by a fixed preference list
    struct PreferenceProvider {
        axis: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for PreferenceProvider {
        fn tag(&self) -> &str {
            "test:preference"
        }

        fn dimension(&self) -> usize {
            3
        }

        async fn initialize(&self) -> Result<(), EmbeddingError> {
            Ok(())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.axis.clone())
        }

        async fn dispose(&self) {}
    }

    fn doc(name: &str, description: &str, embedding: Vec<f32>) -> IndexedTool {
        let mut tool = index_tool(ToolDefinition {
            name: name.to_string(),
            title: None,
            description: description.to_string(),
            input_schema: serde_json::json!({ "type": "object" }),
            output_schema: None,
            metadata: None,
        });
        tool.embedding = Some(embedding);
        tool
    }

    /// BM25 ranks A,B,C; embedding ranks C,B,A. A and C each collect
    /// rank 0 + rank 2 contributions and tie exactly; B collects 2/(k+1).
    #[tokio::test]
    async fn opposed_rankings_fuse_symmetrically() {
        let tools = vec![
            doc("a", "alpha alpha", vec![0.0, 0.0, 1.0]),
            doc("b", "alpha alpha beta", vec![0.6, 0.0, 0.8]),
            doc("c", "alpha beta gamma", vec![1.0, 0.0, 0.0]),
        ];

        let strategy = HybridStrategy::new(
            Arc::new(Bm25Strategy::new()),
            Arc::new(EmbeddingStrategy::new(Arc::new(PreferenceProvider {
                axis: vec![1.0, 0.0, 0.0],
            }))),
        );

        let hits = strategy
            .search("alpha", &tools, &SearchOptions::default())
            .await
            .expect("search");

        assert_eq!(hits.len(), 3);

        // a: 1/61 + 1/63; c: 1/63 + 1/61; b: 1/62 + 1/62
        let score = |name: &str| {
            hits.iter()
                .find(|h| h.name == name)
                .map(|h| h.score)
                .expect("hit")
        };

        assert_eq!(score("a"), score("c"));
        assert_eq!(hits[0].score, 1.0);
        assert!(hits.iter().all(|h| h.match_type == SearchMode::Hybrid));
    }

    #[tokio::test]
    async fn no_embeddings_fails_fast_with_guidance() {
        let mut plain = doc("a", "alpha", vec![]);
        plain.embedding = None;

        let strategy = HybridStrategy::new(
            Arc::new(Bm25Strategy::new()),
            Arc::new(EmbeddingStrategy::new(Arc::new(PreferenceProvider {
                axis: vec![1.0, 0.0, 0.0],
            }))),
        );

        let err = strategy
            .search("alpha", &[plain], &SearchOptions::default())
            .await
            .expect_err("no embeddings");

        assert!(err.to_string().contains("No tools with embeddings"));
    }

    #[tokio::test]
    async fn failing_sub_search_names_the_side() {
        // Stored vectors are 2-wide, provider emits 3-wide: embedding side fails
        let tools = vec![doc("a", "alpha", vec![1.0, 0.0])];

        let strategy = HybridStrategy::new(
            Arc::new(Bm25Strategy::new()),
            Arc::new(EmbeddingStrategy::new(Arc::new(PreferenceProvider {
                axis: vec![1.0, 0.0, 0.0],
            }))),
        );

        let err = strategy
            .search("alpha", &tools, &SearchOptions::default())
            .await
            .expect_err("side failure");

        match err {
            SearchError::HybridSide { side, .. } => assert_eq!(side, "embedding"),
            other => panic!("expected HybridSide, got {other}"),
        }
    }

    #[tokio::test]
    async fn final_threshold_and_top_k_apply_after_fusion() {
        let tools = vec![
            doc("a", "alpha alpha", vec![1.0, 0.0, 0.0]),
            doc("b", "alpha", vec![0.9, 0.1, 0.0]),
            doc("c", "alpha beta", vec![0.8, 0.2, 0.0]),
        ];

        let strategy = HybridStrategy::new(
            Arc::new(Bm25Strategy::new()),
            Arc::new(EmbeddingStrategy::new(Arc::new(PreferenceProvider {
                axis: vec![1.0, 0.0, 0.0],
            }))),
        );

        let hits = strategy
            .search(
                "alpha",
                &tools,
                &SearchOptions {
                    top_k: 2,
                    threshold: Some(0.5),
                },
            )
            .await
            .expect("search");

        assert!(hits.len() <= 2);
        assert!(hits.iter().all(|h| h.score >= 0.5));
    }
}
