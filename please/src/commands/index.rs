use std::time::Duration;

use please_config::{ConfigResolver, IndexScope, PleaseDirs};
use please_index::{
    BuildMetadata, CliArgs, CurrentBuildInputs, IndexBuilder, IndexStore, check_index_regeneration,
};
use please_mcp::{DiscoveryEngine, DiscoveryPhase};

use super::{CLI_VERSION, resolve_provider};
use crate::args::IndexArgs;

pub async fn run(args: IndexArgs) -> anyhow::Result<()> {
    let dirs = PleaseDirs::discover()?;
    let scope: IndexScope = args.scope.into();

    let store = IndexStore::new(super::index_path_for(&dirs, scope, args.output.as_ref()));
    let resolver = ConfigResolver::new(dirs.clone());

    let provider = if args.no_embeddings {
        None
    } else {
        resolve_provider(
            &dirs,
            args.provider.as_deref(),
            args.model.as_deref(),
            &args.dtype,
            Some(please_embeddings::DEFAULT_PROVIDER_TAG),
        )?
    };

    let cli_args = CliArgs {
        mode: None,
        provider: provider.as_ref().map(|(_, tag, _)| tag.clone()),
        dtype: provider.as_ref().map(|(_, _, dtype)| dtype.to_string()),
        exclude: (!args.exclude.is_empty()).then(|| args.exclude.clone()),
        scope: Some(scope.to_string()),
    };

    if !args.force {
        let fingerprints = resolver.fingerprints();
        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: CLI_VERSION,
                cli_args: cli_args.clone(),
                fingerprints: &fingerprints,
                scope: Some(scope),
            },
        );

        if !check.needs_rebuild {
            println!("Index is up to date at {}", store.path().display());
            return Ok(());
        }

        for reason in &check.reasons {
            tracing::info!(reason, "rebuilding index");
        }
    }

    let index = build_index(
        &dirs,
        &resolver,
        scope,
        &args.sources,
        &args.exclude,
        Duration::from_secs(args.timeout),
        provider.as_ref().map(|(p, _, _)| p.clone()),
        cli_args,
    )
    .await?;

    store.save(&index)?;

    println!(
        "Indexed {} tools ({}embeddings) -> {}",
        index.total_tools,
        if index.has_embeddings { "with " } else { "no " },
        store.path().display()
    );

    Ok(())
}

/// The shared indexing pipeline: discover, derive, embed, stamp metadata
///
/// Also used by `serve` when the regeneration detector demands a rebuild.
#[allow(clippy::too_many_arguments)]
pub async fn build_index(
    dirs: &PleaseDirs,
    resolver: &ConfigResolver,
    scope: IndexScope,
    sources: &[String],
    exclude: &[String],
    timeout: Duration,
    provider: Option<std::sync::Arc<dyn please_embeddings::EmbeddingProvider>>,
    cli_args: CliArgs,
) -> anyhow::Result<please_index::PersistedIndex> {
    let mut servers = resolver.merged(scope);
    if !sources.is_empty() {
        servers.retain(|name, _| sources.iter().any(|s| s == name));
    }

    // Fingerprints are captured before discovery so the stored metadata
    // reflects exactly the files this build saw
    let fingerprints = resolver.fingerprints();

    let engine = DiscoveryEngine::new(servers, dirs.oauth_root())
        .exclude(exclude.iter().cloned())
        .timeout(timeout)
        .on_progress(|server, phase| {
            let phase = match phase {
                DiscoveryPhase::Connecting => "connecting",
                DiscoveryPhase::Authenticating => "authenticating",
                DiscoveryPhase::Fetching => "fetching",
                DiscoveryPhase::Done => "done",
                DiscoveryPhase::Error => "error",
            };
            tracing::info!(server, phase, "discovery");
        });

    let outcomes = engine.discover().await;

    let mut tools = Vec::new();
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(server_tools) => tools.extend(server_tools),
            Err(e) => {
                failed += 1;
                tracing::warn!(server = %outcome.server, error = %e, "upstream skipped");
            }
        }
    }
    if failed > 0 {
        tracing::warn!(failed, "some upstreams did not respond; their tools are absent");
    }

    let mut builder = IndexBuilder::new().on_batch(|done, total| {
        tracing::info!(batch = done, total, "embedding batch complete");
    });
    if let Some(provider) = provider {
        builder = builder.with_provider(provider);
    }

    let metadata = BuildMetadata {
        cli_version: CLI_VERSION.to_string(),
        cli_args,
        config_fingerprints: fingerprints,
    };

    Ok(builder.build(tools, Some(metadata)).await?)
}
