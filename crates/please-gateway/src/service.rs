use std::sync::Arc;

use please_search::{SearchMode, SearchRequest};
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam, Tool,
    ToolAnnotations,
};
use serde_json::{Map as JsonMap, json};

use crate::GatewayService;

/// MCP-facing wrapper around the gateway service
///
/// Exposes exactly the three meta-tools plus `tool_search_info`. Tool
/// execution is deliberately absent from this surface: hosts delegate it to
/// the CLI command that `get_tool` returns, which their permission policy
/// can gate per tool-name pattern.
#[derive(Clone)]
pub struct GatewayServer {
    service: Arc<GatewayService>,
}

impl GatewayServer {
    pub fn new(service: Arc<GatewayService>) -> Self {
        Self { service }
    }

    fn meta_tools() -> Vec<Tool> {
        let search_schema = Arc::new(object_schema(
            json!({
                "query": {
                    "type": "string",
                    "description": "Search query (keywords, a phrase, or a regex in regex mode)"
                },
                "mode": {
                    "type": "string",
                    "enum": ["regex", "bm25", "embedding", "hybrid"],
                    "description": "Search mode; defaults to the server's configured mode"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of results (default 10)"
                },
                "threshold": {
                    "type": "number",
                    "description": "Minimum score in [0,1] to include"
                }
            }),
            &["query"],
        ));

        let list_schema = Arc::new(object_schema(
            json!({
                "limit": {
                    "type": "integer",
                    "description": "Page size (default 50)"
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of tools to skip (default 0)"
                }
            }),
            &[],
        ));

        let get_schema = Arc::new(object_schema(
            json!({
                "name": {
                    "type": "string",
                    "description": "Fully qualified tool name (server__tool)"
                }
            }),
            &["name"],
        ));

        let info_schema = Arc::new(object_schema(json!({}), &[]));

        vec![
            Tool {
                name: "search_tools".into(),
                title: Some("Search federated tools".into()),
                description: Some(
                    "Search all indexed upstream MCP tools by relevance. Returns ranked \
                     name/description matches; use get_tool for the full schema."
                        .into(),
                ),
                input_schema: search_schema,
                output_schema: None,
                annotations: Some(ToolAnnotations::default()),
                icons: None,
            },
            Tool {
                name: "list_tools".into(),
                title: Some("List indexed tools".into()),
                description: Some(
                    "Page through every indexed tool as name/title/description triples.".into(),
                ),
                input_schema: list_schema,
                output_schema: None,
                annotations: Some(ToolAnnotations::default()),
                icons: None,
            },
            Tool {
                name: "get_tool".into(),
                title: Some("Get a tool's schema and usage".into()),
                description: Some(
                    "Fetch one tool's full input schema plus the shell command that executes \
                     it through the please CLI."
                        .into(),
                ),
                input_schema: get_schema,
                output_schema: None,
                annotations: Some(ToolAnnotations::default()),
                icons: None,
            },
            Tool {
                name: "tool_search_info".into(),
                title: Some("Index and search-mode status".into()),
                description: Some(
                    "Report index metadata and which search modes are currently available."
                        .into(),
                ),
                input_schema: info_schema,
                output_schema: None,
                annotations: Some(ToolAnnotations::default()),
                icons: None,
            },
        ]
    }

    async fn dispatch(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let args = request.arguments.unwrap_or_default();

        let result = match request.name.as_ref() {
            "search_tools" => self.handle_search(&args).await,
            "list_tools" => self.handle_list(&args),
            "get_tool" => self.handle_get(&args),
            "tool_search_info" => self.handle_info(),
            other => Err(format!("unknown tool: {other}")),
        };

        match result {
            Ok((text, structured)) => Ok(CallToolResult {
                content: vec![Content::text(text)],
                structured_content: Some(structured),
                is_error: Some(false),
                meta: None,
            }),
            Err(message) => Ok(CallToolResult {
                content: vec![Content::text(message)],
                structured_content: None,
                is_error: Some(true),
                meta: None,
            }),
        }
    }

    async fn handle_search(
        &self,
        args: &JsonMap<String, serde_json::Value>,
    ) -> Result<(String, serde_json::Value), String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or("query parameter is required")?;

        let mode = match args.get("mode").and_then(|v| v.as_str()) {
            Some(raw) => Some(raw.parse::<SearchMode>().map_err(|e| e.to_string())?),
            None => None,
        };

        let request = SearchRequest {
            query: query.to_string(),
            mode,
            top_k: args
                .get("top_k")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize),
            threshold: args
                .get("threshold")
                .and_then(|v| v.as_f64())
                .map(|v| v as f32),
        };

        let response = self
            .service
            .search_tools(&request)
            .await
            .map_err(|e| e.to_string())?;

        let text = format!(
            "{} tools matched '{}' in {}ms",
            response.tools.len(),
            response.query,
            response.search_time_ms
        );
        let structured = json!({
            "tools": response.tools,
            "total": response.tools.len(),
            "searchTimeMs": response.search_time_ms,
        });
        Ok((text, structured))
    }

    fn handle_list(
        &self,
        args: &JsonMap<String, serde_json::Value>,
    ) -> Result<(String, serde_json::Value), String> {
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map_or(50, |v| v as usize);
        let offset = args
            .get("offset")
            .and_then(|v| v.as_u64())
            .map_or(0, |v| v as usize);

        let page = self
            .service
            .list_tools(limit, offset)
            .map_err(|e| e.to_string())?;

        let text = format!(
            "{} of {} tools (offset {})",
            page.tools.len(),
            page.total,
            page.offset
        );
        let structured = serde_json::to_value(&page).expect("page serializes");
        Ok((text, structured))
    }

    fn handle_get(
        &self,
        args: &JsonMap<String, serde_json::Value>,
    ) -> Result<(String, serde_json::Value), String> {
        let name = args
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or("name parameter is required")?;

        let details = self.service.get_tool(name).map_err(|e| e.to_string())?;

        let text = format!("{}\nusage: {}", details.tool.name, details.usage);
        let structured = serde_json::to_value(&details).expect("details serialize");
        Ok((text, structured))
    }

    fn handle_info(&self) -> Result<(String, serde_json::Value), String> {
        let info = self.service.search_info().map_err(|e| e.to_string())?;

        let text = format!(
            "{} tools indexed; modes: {}",
            info.total_tools,
            info.available_modes.join(", ")
        );
        let structured = serde_json::to_value(&info).expect("info serializes");
        Ok((text, structured))
    }
}

/// Build an object input schema with the given properties and required list
fn object_schema(
    properties: serde_json::Value,
    required: &[&str],
) -> JsonMap<String, serde_json::Value> {
    let mut schema = JsonMap::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), properties);
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema.insert("additionalProperties".into(), json!(false));
    schema
}

impl ServerHandler for GatewayServer {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult {
            tools: Self::meta_tools(),
            next_cursor: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_
    {
        Box::pin(async move { self.dispatch(request).await })
    }
}
