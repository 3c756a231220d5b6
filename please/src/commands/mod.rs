pub mod call;
pub mod index;
pub mod install;
pub mod mcp;
pub mod search;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use please_config::PleaseDirs;
use please_embeddings::{Dtype, EmbeddingProvider, ProviderRegistry};

/// CLI version recorded in build metadata and compared by the detector
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve an embedding provider from the `--provider`/`--model`/`--dtype`
/// flags; `None` when embeddings are disabled.
pub fn resolve_provider(
    dirs: &PleaseDirs,
    provider: Option<&str>,
    model: Option<&str>,
    dtype: &str,
    default_tag: Option<&str>,
) -> anyhow::Result<Option<(Arc<dyn EmbeddingProvider>, String, Dtype)>> {
    let Some(tag) = provider
        .map(str::to_string)
        .or_else(|| default_tag.map(str::to_string))
    else {
        return Ok(None);
    };

    // `--model` swaps the model part of a `location:model` tag
    let tag = match (model, tag.split_once(':')) {
        (Some(model), Some((location, _))) => format!("{location}:{model}"),
        _ => tag,
    };

    let dtype: Dtype = dtype.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let registry = ProviderRegistry::with_builtins(dirs.model_root());
    let provider = registry.create(&tag, dtype)?;

    Ok(Some((provider, tag, dtype)))
}

/// Index file path for a scope, honoring an explicit `--index` override
pub fn index_path_for(
    dirs: &PleaseDirs,
    scope: please_config::IndexScope,
    explicit: Option<&PathBuf>,
) -> PathBuf {
    explicit.map_or_else(|| dirs.index_path(scope), Clone::clone)
}
