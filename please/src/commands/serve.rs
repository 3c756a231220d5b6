use std::sync::Arc;
use std::time::Duration;

use please_config::{ConfigResolver, IndexScope, PleaseDirs};
use please_gateway::{GatewayServer, GatewayService, gateway_router};
use please_index::{CliArgs, CurrentBuildInputs, IndexStore, check_index_regeneration};
use please_search::SearchMode;
use rmcp::ServiceExt as _;

use super::CLI_VERSION;
use crate::args::{ServeArgs, ServeTransport};

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let dirs = PleaseDirs::discover()?;
    let scope: IndexScope = args.scope.into();

    let provider = super::resolve_provider(
        &dirs,
        args.provider.as_deref(),
        None,
        &args.dtype,
        None,
    )?;

    // Stale indexes rebuild before serving; `all` maintains the project
    // index, which is the one reflecting the local federation
    if args.index.is_none() {
        let rebuild_scope = match scope {
            IndexScope::All => IndexScope::Project,
            other => other,
        };
        rebuild_if_stale(&dirs, rebuild_scope, &args, provider.as_ref()).await?;
    }

    let default_mode = match &args.mode {
        Some(raw) => raw.parse::<SearchMode>()?,
        None if provider.is_some() => SearchMode::Hybrid,
        None => SearchMode::Bm25,
    };

    let service = Arc::new(GatewayService::new(
        dirs,
        scope,
        default_mode,
        10,
        provider.map(|(p, _, _)| p),
    ));

    // Load eagerly so startup errors surface before the host connects
    let merged = service.merged()?;
    tracing::info!(
        tools = merged.tools.len(),
        has_embeddings = merged.has_embeddings,
        scope = %scope,
        "gateway ready"
    );

    match args.transport {
        ServeTransport::Stdio => serve_stdio(service).await,
        ServeTransport::Http => serve_http(service, args.port).await,
    }
}

async fn serve_stdio(service: Arc<GatewayService>) -> anyhow::Result<()> {
    let server = GatewayServer::new(service);

    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| anyhow::anyhow!("stdio serve failed: {e}"))?;

    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("gateway terminated abnormally: {e}"))?;

    Ok(())
}

async fn serve_http(service: Arc<GatewayService>, port: u16) -> anyhow::Result<()> {
    let router = gateway_router(service);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;

    tracing::info!(port, "gateway listening on http");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}

/// Run the regeneration detector and rebuild through the indexing pipeline
/// when it says so
async fn rebuild_if_stale(
    dirs: &PleaseDirs,
    scope: IndexScope,
    args: &ServeArgs,
    provider: Option<&(
        Arc<dyn please_embeddings::EmbeddingProvider>,
        String,
        please_embeddings::Dtype,
    )>,
) -> anyhow::Result<()> {
    let resolver = ConfigResolver::new(dirs.clone());
    let store = IndexStore::new(dirs.index_path(scope));

    let cli_args = CliArgs {
        mode: args.mode.clone(),
        provider: provider.map(|(_, tag, _)| tag.clone()),
        dtype: provider.map(|(_, _, dtype)| dtype.to_string()),
        exclude: None,
        scope: Some(scope.to_string()),
    };

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
        return Ok(());
    }

    for reason in &check.reasons {
        tracing::info!(reason, "index is stale, rebuilding before serving");
    }

    let index = super::index::build_index(
        dirs,
        &resolver,
        scope,
        &[],
        &[],
        Duration::from_secs(30),
        provider.map(|(p, _, _)| p.clone()),
        cli_args,
    )
    .await?;

    store.save(&index)?;
    tracing::info!(tools = index.total_tools, "index rebuilt");

    Ok(())
}
