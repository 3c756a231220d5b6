use std::sync::Arc;

use please_config::{IndexScope, PleaseDirs};
use please_index::{IndexStore, IndexedTool, PersistedIndex, merge_bm25_stats, merge_indexed_tools};
use please_search::{
    Bm25Strategy, EmbeddingStrategy, HybridStrategy, RegexStrategy, SearchMode, SearchOrchestrator,
    SearchRequest, SearchResponse,
};

use crate::args::{SearchArgs, SearchFormat};

pub async fn run(args: SearchArgs) -> anyhow::Result<()> {
    let dirs = PleaseDirs::discover()?;

    let (tools, stats) = load_documents(&dirs, &args)?;

    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<SearchMode>)
        .transpose()?;

    let needs_vectors = matches!(mode, Some(SearchMode::Embedding | SearchMode::Hybrid));
    let provider = super::resolve_provider(
        &dirs,
        args.provider.as_deref(),
        None,
        "fp32",
        needs_vectors.then_some(please_embeddings::DEFAULT_PROVIDER_TAG),
    )?;

    let bm25 = Arc::new(Bm25Strategy::with_stats(stats));
    let mut orchestrator = SearchOrchestrator::new(SearchMode::Bm25, args.top_k);
    orchestrator.register(Arc::new(RegexStrategy::new()));
    orchestrator.register(bm25.clone());

    if let Some((provider, _, _)) = provider {
        let embedding = Arc::new(EmbeddingStrategy::new(provider));
        orchestrator.register(embedding.clone());
        orchestrator.register(Arc::new(HybridStrategy::new(bm25, embedding)));
    }

    let request = SearchRequest {
        query: args.query.clone(),
        mode,
        top_k: Some(args.top_k),
        threshold: args.threshold,
    };

    let response = orchestrator.search(&request, &tools).await?;
    print_response(&response, args.format);

    Ok(())
}

/// Load the candidate documents per `--index`/`--scope`
fn load_documents(
    dirs: &PleaseDirs,
    args: &SearchArgs,
) -> anyhow::Result<(Vec<IndexedTool>, please_index::Bm25Stats)> {
    if let Some(path) = &args.index {
        let index = IndexStore::new(path).load()?;
        return Ok((index.tools, index.bm25_stats));
    }

    let scope: IndexScope = args.scope.into();
    Ok(match scope {
        IndexScope::Project | IndexScope::User => {
            let index = load_or_empty(dirs, scope);
            (index.tools, index.bm25_stats)
        }
        IndexScope::All => {
            let project = load_or_empty(dirs, IndexScope::Project);
            let user = load_or_empty(dirs, IndexScope::User);
            let stats = merge_bm25_stats(&project.bm25_stats, &user.bm25_stats);
            (merge_indexed_tools(project.tools, user.tools), stats)
        }
    })
}

fn load_or_empty(dirs: &PleaseDirs, scope: IndexScope) -> PersistedIndex {
    match IndexStore::new(dirs.index_path(scope)).load() {
        Ok(index) => index,
        Err(e) => {
            tracing::debug!(scope = %scope, error = %e, "index unavailable, treating as empty");
            PersistedIndex::empty(None)
        }
    }
}

fn print_response(response: &SearchResponse, format: SearchFormat) {
    match format {
        SearchFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(response).expect("response serializes")
            );
        }
        SearchFormat::Minimal => {
            for hit in &response.tools {
                println!("{}\t{:.3}", hit.name, hit.score);
            }
        }
        SearchFormat::Table => {
            if response.tools.is_empty() {
                println!(
                    "No results for '{}' ({} tools indexed)",
                    response.query, response.total_indexed
                );
                return;
            }

            let width = response
                .tools
                .iter()
                .map(|h| h.name.len())
                .max()
                .unwrap_or(4)
                .max(4);

            println!("{:<width$}  {:>6}  DESCRIPTION", "NAME", "SCORE");
            for hit in &response.tools {
                let description: String = hit.description.chars().take(70).collect();
                println!("{:<width$}  {:>6.3}  {}", hit.name, hit.score, description);
            }
            println!(
                "\n{} results in {}ms ({} mode, {} indexed)",
                response.tools.len(),
                response.search_time_ms,
                response.mode,
                response.total_indexed
            );
        }
    }
}
