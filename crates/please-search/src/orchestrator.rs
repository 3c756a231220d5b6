use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use please_index::IndexedTool;
use serde::Serialize;

use crate::error::SearchError;
use crate::strategy::{SearchHit, SearchMode, SearchOptions, SearchStrategy};

/// A search request as it arrives from the gateway or the CLI
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: Option<SearchMode>,
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: None,
            top_k: None,
            threshold: None,
        }
    }
}

/// A completed search with its timing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub tools: Vec<SearchHit>,
    pub query: String,
    pub mode: SearchMode,
    pub total_indexed: usize,
    pub search_time_ms: u64,
}

/// Routes requests to the strategy for their mode and measures latency
pub struct SearchOrchestrator {
    strategies: HashMap<SearchMode, Arc<dyn SearchStrategy>>,
    default_mode: SearchMode,
    default_top_k: usize,
}

impl SearchOrchestrator {
    pub fn new(default_mode: SearchMode, default_top_k: usize) -> Self {
        Self {
            strategies: HashMap::new(),
            default_mode,
            default_top_k,
        }
    }

    /// Register a strategy under its own mode
    pub fn register(&mut self, strategy: Arc<dyn SearchStrategy>) {
        self.strategies.insert(strategy.mode(), strategy);
    }

    /// Initialize every registered strategy
    pub async fn initialize(&self) -> Result<(), SearchError> {
        for strategy in self.strategies.values() {
            strategy.initialize().await?;
        }
        Ok(())
    }

    /// Run one search against the candidate documents
    pub async fn search(
        &self,
        request: &SearchRequest,
        tools: &[IndexedTool],
    ) -> Result<SearchResponse, SearchError> {
        let mode = request.mode.unwrap_or(self.default_mode);

        let strategy = self
            .strategies
            .get(&mode)
            .ok_or_else(|| SearchError::UnknownMode(mode.to_string()))?;

        let options = SearchOptions {
            top_k: request.top_k.unwrap_or(self.default_top_k),
            threshold: request.threshold,
        };

        let started = Instant::now();
        let hits = strategy.search(&request.query, tools, &options).await?;
        let search_time_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            query = %request.query,
            mode = %mode,
            results = hits.len(),
            ms = search_time_ms,
            "search complete"
        );

        Ok(SearchResponse {
            tools: hits,
            query: request.query.clone(),
            mode,
            total_indexed: tools.len(),
            search_time_ms,
        })
    }

    /// Release every registered strategy's resources
    pub async fn dispose(&self) {
        for strategy in self.strategies.values() {
            strategy.dispose().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use please_index::index_tool;
    use please_mcp::ToolDefinition;

    use super::*;
    use crate::bm25::Bm25Strategy;
    use crate::regex::RegexStrategy;

    fn corpus() -> Vec<IndexedTool> {
        ["read_file", "write_file", "git_commit"]
            .into_iter()
            .map(|name| {
                index_tool(ToolDefinition {
                    name: name.to_string(),
                    title: None,
                    description: format!("{} tool", name.replace('_', " ")),
                    input_schema: serde_json::json!({ "type": "object" }),
                    output_schema: None,
                    metadata: None,
                })
            })
            .collect()
    }

    fn orchestrator() -> SearchOrchestrator {
        let mut orchestrator = SearchOrchestrator::new(SearchMode::Bm25, 10);
        orchestrator.register(Arc::new(Bm25Strategy::new()));
        orchestrator.register(Arc::new(RegexStrategy::new()));
        orchestrator
    }

    #[tokio::test]
    async fn default_mode_is_used_when_unspecified() {
        let response = orchestrator()
            .search(&SearchRequest::new("file"), &corpus())
            .await
            .expect("search");

        assert_eq!(response.mode, SearchMode::Bm25);
        assert_eq!(response.total_indexed, 3);
        assert_eq!(response.query, "file");
        assert!(!response.tools.is_empty());
    }

    #[tokio::test]
    async fn explicit_mode_routes_to_that_strategy() {
        let mut request = SearchRequest::new("read.*");
        request.mode = Some(SearchMode::Regex);

        let response = orchestrator()
            .search(&request, &corpus())
            .await
            .expect("search");

        assert_eq!(response.mode, SearchMode::Regex);
        assert_eq!(response.tools[0].name, "read_file");
    }

    #[tokio::test]
    async fn unregistered_mode_is_a_hard_error() {
        let mut request = SearchRequest::new("anything");
        request.mode = Some(SearchMode::Embedding);

        let err = orchestrator()
            .search(&request, &corpus())
            .await
            .expect_err("unknown mode");

        assert!(matches!(err, SearchError::UnknownMode(_)));
    }

    #[tokio::test]
    async fn top_k_override_applies() {
        let mut request = SearchRequest::new("file");
        request.top_k = Some(1);

        let response = orchestrator()
            .search(&request, &corpus())
            .await
            .expect("search");

        assert_eq!(response.tools.len(), 1);
    }
}
