//! End-to-end search behavior across the public API

use std::sync::Arc;

use async_trait::async_trait;
use please_embeddings::{EmbeddingError, EmbeddingProvider};
use please_index::{IndexedTool, index_tool};
use please_mcp::ToolDefinition;
use please_search::{
    Bm25Strategy, EmbeddingStrategy, HybridStrategy, RegexStrategy, SearchMode, SearchOrchestrator,
    SearchRequest,
};

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

fn file_corpus() -> Vec<IndexedTool> {
    vec![
        tool("read_file", "Read a file"),
        tool("write_file", "Write a file"),
        tool("git_commit", "Git commit"),
    ]
}

fn orchestrator() -> SearchOrchestrator {
    let mut orchestrator = SearchOrchestrator::new(SearchMode::Bm25, 10);
    orchestrator.register(Arc::new(RegexStrategy::new()));
    orchestrator.register(Arc::new(Bm25Strategy::new()));
    orchestrator
}

#[tokio::test]
async fn bm25_ranks_both_file_tools_on_top() {
    let request = SearchRequest {
        query: "file".into(),
        mode: Some(SearchMode::Bm25),
        top_k: Some(2),
        threshold: None,
    };

    let response = orchestrator()
        .search(&request, &file_corpus())
        .await
        .expect("search");

    assert_eq!(response.tools.len(), 2);
    assert_eq!(response.tools[0].score, 1.0);

    let names: Vec<&str> = response.tools.iter().map(|h| h.name.as_str()).collect();
    assert!(names.contains(&"read_file"));
    assert!(names.contains(&"write_file"));
}

#[tokio::test]
async fn regex_pattern_and_literal_fallback() {
    let mut request = SearchRequest::new("read.*");
    request.mode = Some(SearchMode::Regex);

    let response = orchestrator()
        .search(&request, &file_corpus())
        .await
        .expect("search");
    assert_eq!(response.tools[0].name, "read_file");

    // An unclosed group is not a valid pattern; the literal fallback finds
    // nothing because no tool mentions "read(".
    let mut request = SearchRequest::new("read(");
    request.mode = Some(SearchMode::Regex);

    let response = orchestrator()
        .search(&request, &file_corpus())
        .await
        .expect("search");
    assert!(response.tools.is_empty());
}

struct AxisProvider;

#[async_trait]
impl EmbeddingProvider for AxisProvider {
    fn tag(&self) -> &str {
        "test:axis"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![1.0, 0.0])
    }

    async fn dispose(&self) {}
}

#[tokio::test]
async fn embedding_mode_demands_vectors_in_the_index() {
    let mut orchestrator = orchestrator();
    orchestrator.register(Arc::new(EmbeddingStrategy::new(Arc::new(AxisProvider))));

    let mut request = SearchRequest::new("anything");
    request.mode = Some(SearchMode::Embedding);

    // The corpus has hasEmbeddings=false semantics: no tool carries a vector
    let err = orchestrator
        .search(&request, &file_corpus())
        .await
        .expect_err("no vectors");

    assert!(err.to_string().contains("No tools with embeddings"));
}

#[tokio::test]
async fn hybrid_fuses_both_rankings() {
    let mut tools = file_corpus();
    tools[0].embedding = Some(vec![1.0, 0.0]);
    tools[1].embedding = Some(vec![0.0, 1.0]);
    tools[2].embedding = Some(vec![0.7, 0.7]);

    let bm25 = Arc::new(Bm25Strategy::new());
    let embedding = Arc::new(EmbeddingStrategy::new(Arc::new(AxisProvider)));

    let mut orchestrator = SearchOrchestrator::new(SearchMode::Hybrid, 10);
    orchestrator.register(bm25.clone());
    orchestrator.register(embedding.clone());
    orchestrator.register(Arc::new(HybridStrategy::new(bm25, embedding)));

    let response = orchestrator
        .search(&SearchRequest::new("file"), &tools)
        .await
        .expect("search");

    // read_file leads both sub-rankings (bm25 tie broken by order, vector
    // aligned with the query axis), so it tops the fused list at 1.0
    assert_eq!(response.tools[0].name, "read_file");
    assert_eq!(response.tools[0].score, 1.0);
    assert!(
        response
            .tools
            .iter()
            .all(|h| h.match_type == SearchMode::Hybrid)
    );
    assert!(response.tools.windows(2).all(|w| w[0].score >= w[1].score));
}
