use serde::{Deserialize, Serialize};

/// Separator between server name and tool name in a qualified name
pub const TOOL_SEPARATOR: &str = "__";

/// Provenance metadata key: originating upstream server name
pub const METADATA_SERVER: &str = "server";

/// Provenance metadata key: the tool's original name on that upstream
pub const METADATA_ORIGINAL_NAME: &str = "originalName";

/// Build the externally-visible name `server__tool`
pub fn qualify(server: &str, original: &str) -> String {
    format!("{server}{TOOL_SEPARATOR}{original}")
}

/// Split a qualified name into (`server`, `tool`)
pub fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    qualified.split_once(TOOL_SEPARATOR)
}

/// An MCP tool definition as received from an upstream
///
/// Immutable once received; aggregation renames `name` to the qualified form
/// and records provenance in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub input_schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ToolDefinition {
    /// Convert an rmcp tool into our definition shape
    pub fn from_rmcp(tool: &rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            title: tool.title.clone(),
            description: tool.description.as_deref().unwrap_or("").to_string(),
            input_schema: serde_json::to_value(&*tool.input_schema).unwrap_or_default(),
            output_schema: tool
                .output_schema
                .as_ref()
                .map(|s| serde_json::to_value(&**s).unwrap_or_default()),
            metadata: None,
        }
    }

    /// Rename to the qualified form and record provenance
    pub fn adorn(mut self, server_name: &str) -> Self {
        let original = self.name.clone();
        self.name = qualify(server_name, &original);

        let metadata = self.metadata.get_or_insert_with(serde_json::Map::new);
        metadata.insert(METADATA_SERVER.into(), server_name.into());
        metadata.insert(METADATA_ORIGINAL_NAME.into(), original.into());

        self
    }

    /// Provenance recorded during aggregation, if any
    pub fn provenance(&self) -> Option<(&str, &str)> {
        let metadata = self.metadata.as_ref()?;
        let server = metadata.get(METADATA_SERVER)?.as_str()?;
        let original = metadata.get(METADATA_ORIGINAL_NAME)?.as_str()?;
        Some((server, original))
    }
}
