use std::sync::RwLock;

use async_trait::async_trait;
use please_index::{Bm25Stats, IndexedTool, compute_bm25_stats, tokenize};

use crate::error::SearchError;
use crate::strategy::{SearchHit, SearchMode, SearchOptions, SearchStrategy, finalize_hits};

/// Okapi BM25 constants
const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Okapi BM25 ranking over the token sequences in the index
///
/// Corpus statistics are normally injected from the persisted index; when
/// they are not, they are computed from the passed-in documents on the fly.
/// Scores are max-normalized so the top result scores 1.0.
pub struct Bm25Strategy {
    stats: RwLock<Option<Bm25Stats>>,
}

impl Bm25Strategy {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(None),
        }
    }

    pub fn with_stats(stats: Bm25Stats) -> Self {
        Self {
            stats: RwLock::new(Some(stats)),
        }
    }

    /// Inject corpus statistics after construction
    pub fn set_stats(&self, stats: Bm25Stats) {
        *self.stats.write().expect("stats lock") = Some(stats);
    }

    fn score_document(query_terms: &[String], tool: &IndexedTool, stats: &Bm25Stats) -> f64 {
        let doc_len = tool.tokens.len() as f64;
        if doc_len == 0.0 {
            return 0.0;
        }

        let n = stats.total_documents as f64;
        let avg_len = if stats.avg_doc_length > 0.0 {
            stats.avg_doc_length
        } else {
            doc_len
        };

        let mut score = 0.0;
        for term in query_terms {
            let tf = tool.tokens.iter().filter(|t| *t == term).count() as f64;
            if tf == 0.0 {
                continue;
            }

            let df = stats
                .document_frequencies
                .get(term)
                .copied()
                .unwrap_or(0) as f64;

            let idf = (((n - df + 0.5) / (df + 0.5)) + 1.0).ln();
            let tf_norm = tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * doc_len / avg_len));

            score += idf * tf_norm;
        }

        score
    }
}

impl Default for Bm25Strategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for Bm25Strategy {
    fn mode(&self) -> SearchMode {
        SearchMode::Bm25
    }

    async fn initialize(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        tools: &[IndexedTool],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let injected = self.stats.read().expect("stats lock").clone();
        let stats = injected.unwrap_or_else(|| compute_bm25_stats(tools));

        let mut scored: Vec<(usize, f64)> = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| (i, Self::score_document(&query_terms, tool, &stats)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Normalize by the best score so the top result lands on 1.0
        if let Some(max) = scored
            .iter()
            .map(|(_, s)| *s)
            .fold(None::<f64>, |acc, s| Some(acc.map_or(s, |m| m.max(s))))
        {
            for (_, score) in &mut scored {
                *score /= max;
            }
        }

        let hits = scored
            .into_iter()
            .map(|(i, score)| SearchHit::from_tool(&tools[i], score as f32, SearchMode::Bm25))
            .collect();

        Ok(finalize_hits(hits, options))
    }

    async fn dispose(&self) {}
}

#[cfg(test)]
mod tests {
    use please_index::index_tool;
    use please_mcp::ToolDefinition;

    use super::*;

    fn tool(name: &str, description: &str) -> IndexedTool {
        index_tool(ToolDefinition {
            name: name.to_string(),
            title: None,
            description: description.to_string(),
            input_schema: serde_json::json!({ "type": "object" }),
            output_schema: None,
            metadata: None,
        })
    }

    fn corpus() -> Vec<IndexedTool> {
        vec![
            tool("read_file", "Read a file"),
            tool("write_file", "Write a file"),
            tool("git_commit", "Git commit"),
        ]
    }

    #[tokio::test]
    async fn file_query_surfaces_the_file_tools() {
        let hits = Bm25Strategy::new()
            .search(
                "file",
                &corpus(),
                &SearchOptions {
                    top_k: 2,
                    threshold: None,
                },
            )
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, 1.0);

        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert!(names.contains(&"read_file"));
        assert!(names.contains(&"write_file"));
    }

    #[tokio::test]
    async fn zero_scoring_documents_are_dropped() {
        let hits = Bm25Strategy::new()
            .search("commit", &corpus(), &SearchOptions::default())
            .await
            .expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "git_commit");
    }

    #[tokio::test]
    async fn stop_word_only_query_returns_nothing() {
        let hits = Bm25Strategy::new()
            .search("the of a", &corpus(), &SearchOptions::default())
            .await
            .expect("search");

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_query_returns_nothing() {
        let hits = Bm25Strategy::new()
            .search("", &corpus(), &SearchOptions::default())
            .await
            .expect("search");

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn results_are_sorted_descending() {
        let hits = Bm25Strategy::new()
            .search("read file", &corpus(), &SearchOptions::default())
            .await
            .expect("search");

        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].score, 1.0);
    }

    #[tokio::test]
    async fn injected_stats_are_used_over_on_the_fly_stats() {
        let tools = corpus();
        let strategy = Bm25Strategy::new();
        strategy.set_stats(compute_bm25_stats(&tools));

        let injected = strategy
            .search("file", &tools, &SearchOptions::default())
            .await
            .expect("search");

        let on_the_fly = Bm25Strategy::new()
            .search("file", &tools, &SearchOptions::default())
            .await
            .expect("search");

        let scores = |hits: &[SearchHit]| hits.iter().map(|h| h.score).collect::<Vec<_>>();
        assert_eq!(scores(&injected), scores(&on_the_fly));
    }

    #[tokio::test]
    async fn rarer_terms_weigh_more() {
        let tools = vec![
            tool("a", "database database query"),
            tool("b", "database query"),
            tool("c", "database"),
            tool("d", "unique_term"),
        ];

        let hits = Bm25Strategy::new()
            .search("unique_term", &tools, &SearchOptions::default())
            .await
            .expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "d");
    }
}
