use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use please_search::{SearchMode, SearchRequest};
use serde::Deserialize;

use crate::{GatewayError, GatewayService};

/// HTTP serving surface for `serve --transport http`
///
/// The same search/list/get operations as the MCP surface, as plain JSON
/// routes.
pub fn gateway_router(service: Arc<GatewayService>) -> Router {
    Router::new()
        .route("/mcp/search", get(search_tools))
        .route("/mcp/tools/list", post(list_tools))
        .route("/mcp/tools/{name}", get(get_tool))
        .route("/mcp/info", get(search_info))
        .with_state(service)
}

/// Query parameters for tool search
#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    threshold: Option<f32>,
}

async fn search_tools(
    State(service): State<Arc<GatewayService>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, HttpError> {
    let mode = params
        .mode
        .as_deref()
        .map(str::parse::<SearchMode>)
        .transpose()
        .map_err(GatewayError::Search)?;

    let request = SearchRequest {
        query: params.q,
        mode,
        top_k: params.top_k,
        threshold: params.threshold,
    };

    let response = service.search_tools(&request).await?;
    Ok(Json(serde_json::json!({
        "tools": response.tools,
        "total": response.tools.len(),
        "searchTimeMs": response.search_time_ms,
    })))
}

/// Body for tool listing
#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

const fn default_limit() -> usize {
    50
}

async fn list_tools(
    State(service): State<Arc<GatewayService>>,
    Json(params): Json<ListParams>,
) -> Result<impl IntoResponse, HttpError> {
    let page = service.list_tools(params.limit, params.offset)?;
    Ok(Json(page))
}

async fn get_tool(
    State(service): State<Arc<GatewayService>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let details = service.get_tool(&name)?;
    Ok(Json(details))
}

async fn search_info(
    State(service): State<Arc<GatewayService>>,
) -> Result<impl IntoResponse, HttpError> {
    let info = service.search_info()?;
    Ok(Json(info))
}

/// Error wrapper that maps gateway errors onto HTTP statuses
struct HttpError(GatewayError);

impl From<GatewayError> for HttpError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self.0 {
            GatewayError::ToolNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Search(_) => StatusCode::BAD_REQUEST,
            GatewayError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": { "message": self.0.to_string() }
        });

        (status, Json(body)).into_response()
    }
}
