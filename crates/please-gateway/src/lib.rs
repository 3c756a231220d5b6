#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! The gateway serving surface: one or two scoped indexes merged and cached,
//! exposed to MCP hosts as the `search_tools` / `list_tools` / `get_tool`
//! meta-tools plus `tool_search_info`.

mod error;
mod http;
mod service;
mod usage;

use std::sync::{Arc, RwLock};

use please_config::{IndexScope, PleaseDirs};
use please_embeddings::EmbeddingProvider;
use please_index::{
    Bm25Stats, IndexStore, IndexedTool, PersistedIndex, merge_bm25_stats, merge_indexed_tools,
};
use please_search::{
    Bm25Strategy, EmbeddingStrategy, HybridStrategy, RegexStrategy, SearchMode, SearchOrchestrator,
    SearchRequest, SearchResponse,
};
use serde::Serialize;

pub use error::GatewayError;
pub use http::gateway_router;
pub use service::GatewayServer;
pub use usage::usage_template;

/// The merged view served for the lifetime of the process
#[derive(Debug)]
pub struct MergedIndex {
    pub tools: Vec<IndexedTool>,
    pub bm25_stats: Bm25Stats,
    pub has_embeddings: bool,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
}

impl MergedIndex {
    fn from_single(index: PersistedIndex) -> Self {
        Self {
            tools: index.tools,
            bm25_stats: index.bm25_stats,
            has_embeddings: index.has_embeddings,
            embedding_model: index.embedding_model,
            embedding_dimensions: index.embedding_dimensions,
        }
    }

    /// Merge project over user: tools deduplicate with project winning,
    /// BM25 statistics combine, embedding availability is the disjunction.
    fn from_pair(project: PersistedIndex, user: PersistedIndex) -> Self {
        let bm25_stats = merge_bm25_stats(&project.bm25_stats, &user.bm25_stats);
        let has_embeddings = project.has_embeddings || user.has_embeddings;
        let embedding_model = project.embedding_model.or(user.embedding_model);
        let embedding_dimensions = project.embedding_dimensions.or(user.embedding_dimensions);

        Self {
            tools: merge_indexed_tools(project.tools, user.tools),
            bm25_stats,
            has_embeddings,
            embedding_model,
            embedding_dimensions,
        }
    }
}

/// Name/title/description summary for listings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
}

/// One page of the merged tool list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPage {
    pub tools: Vec<ToolSummary>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Full detail for one tool, with the CLI execution template
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetails {
    pub tool: please_mcp::ToolDefinition,
    pub usage: String,
}

/// Index metadata plus which search modes can run right now
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInfo {
    pub total_tools: usize,
    pub has_embeddings: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<usize>,
    pub available_modes: Vec<String>,
    pub scope: String,
}

/// Loads and serves the scoped indexes
pub struct GatewayService {
    dirs: PleaseDirs,
    scope: IndexScope,
    orchestrator: SearchOrchestrator,
    bm25: Arc<Bm25Strategy>,
    cache: RwLock<Option<Arc<MergedIndex>>>,
}

impl GatewayService {
    /// Assemble the service with the strategies the environment can support
    ///
    /// Embedding and hybrid modes register only when a provider is supplied;
    /// regex and BM25 are always available.
    pub fn new(
        dirs: PleaseDirs,
        scope: IndexScope,
        default_mode: SearchMode,
        default_top_k: usize,
        provider: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let bm25 = Arc::new(Bm25Strategy::new());

        let mut orchestrator = SearchOrchestrator::new(default_mode, default_top_k);
        orchestrator.register(Arc::new(RegexStrategy::new()));
        orchestrator.register(bm25.clone());

        if let Some(provider) = provider {
            let embedding = Arc::new(EmbeddingStrategy::new(provider));
            orchestrator.register(embedding.clone());
            orchestrator.register(Arc::new(HybridStrategy::new(bm25.clone(), embedding)));
        }

        Self {
            dirs,
            scope,
            orchestrator,
            bm25,
            cache: RwLock::new(None),
        }
    }

    pub fn scope(&self) -> IndexScope {
        self.scope
    }

    /// The merged index, loaded once and cached for the process lifetime
    pub fn merged(&self) -> Result<Arc<MergedIndex>, GatewayError> {
        if let Some(cached) = self.cache.read().expect("cache lock").as_ref() {
            return Ok(cached.clone());
        }

        let merged = Arc::new(self.load_merged()?);
        self.bm25.set_stats(merged.bm25_stats.clone());
        *self.cache.write().expect("cache lock") = Some(merged.clone());

        tracing::info!(
            scope = %self.scope,
            tools = merged.tools.len(),
            has_embeddings = merged.has_embeddings,
            "gateway index loaded"
        );

        Ok(merged)
    }

    /// Drop the cached index; the next request reloads from disk
    pub fn invalidate(&self) {
        self.cache.write().expect("cache lock").take();
    }

    fn load_merged(&self) -> Result<MergedIndex, GatewayError> {
        match self.scope {
            IndexScope::Project | IndexScope::User => {
                Ok(MergedIndex::from_single(self.load_scope(self.scope)))
            }
            IndexScope::All => {
                let project = self.load_scope(IndexScope::Project);
                let user = self.load_scope(IndexScope::User);
                Ok(MergedIndex::from_pair(project, user))
            }
        }
    }

    /// Load one scope's index; a missing or unreadable file serves as empty
    /// rather than taking the gateway down.
    fn load_scope(&self, scope: IndexScope) -> PersistedIndex {
        let store = IndexStore::new(self.dirs.index_path(scope));
        match store.load() {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "index unavailable, serving empty");
                PersistedIndex::empty(None)
            }
        }
    }

    /// `search_tools` semantics
    pub async fn search_tools(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, GatewayError> {
        let merged = self.merged()?;
        Ok(self.orchestrator.search(request, &merged.tools).await?)
    }

    /// `list_tools` semantics: paginate over the merged index
    pub fn list_tools(&self, limit: usize, offset: usize) -> Result<ToolPage, GatewayError> {
        let merged = self.merged()?;

        let tools = merged
            .tools
            .iter()
            .skip(offset)
            .take(limit)
            .map(|t| ToolSummary {
                name: t.tool.name.clone(),
                title: t.tool.title.clone(),
                description: t.tool.description.clone(),
            })
            .collect();

        Ok(ToolPage {
            tools,
            total: merged.tools.len(),
            limit,
            offset,
        })
    }

    /// `get_tool` semantics: full schema plus the CLI usage template
    pub fn get_tool(&self, name: &str) -> Result<ToolDetails, GatewayError> {
        let merged = self.merged()?;

        let tool = merged
            .tools
            .iter()
            .find(|t| t.tool.name == name)
            .ok_or_else(|| GatewayError::ToolNotFound {
                name: name.to_string(),
            })?;

        Ok(ToolDetails {
            usage: usage_template(&tool.tool),
            tool: tool.tool.clone(),
        })
    }

    /// `tool_search_info` semantics
    pub fn search_info(&self) -> Result<SearchInfo, GatewayError> {
        let merged = self.merged()?;

        let mut available_modes = vec!["regex".to_string(), "bm25".to_string()];
        if merged.has_embeddings {
            available_modes.push("embedding".to_string());
            available_modes.push("hybrid".to_string());
        }

        Ok(SearchInfo {
            total_tools: merged.tools.len(),
            has_embeddings: merged.has_embeddings,
            embedding_model: merged.embedding_model.clone(),
            embedding_dimensions: merged.embedding_dimensions,
            available_modes,
            scope: self.scope.to_string(),
        })
    }
}
