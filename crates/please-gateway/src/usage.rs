use please_mcp::ToolDefinition;

/// Shell command a host can run to execute this tool through the CLI
///
/// The host grants the command by permission policy, matched per tool-name
/// pattern; arguments stay a placeholder JSON object the model fills in.
pub fn usage_template(tool: &ToolDefinition) -> String {
    let args = placeholder_args(&tool.input_schema);
    format!(
        "please {} --args '{}'",
        tool.name,
        serde_json::to_string(&args).expect("placeholder object serializes")
    )
}

/// Placeholder object covering the schema's required properties
fn placeholder_args(schema: &serde_json::Value) -> serde_json::Value {
    let mut args = serde_json::Map::new();

    let properties = schema.get("properties").and_then(|p| p.as_object());
    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| {
            r.iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<&str>>()
        })
        .unwrap_or_default();

    if let Some(properties) = properties {
        for name in required {
            if let Some(prop) = properties.get(name) {
                args.insert(name.to_string(), placeholder(prop).into());
            }
        }
    }

    serde_json::Value::Object(args)
}

/// One placeholder string derived from a property schema
fn placeholder(schema: &serde_json::Value) -> String {
    if let Some(values) = schema.get("enum").and_then(|e| e.as_array()) {
        let mut shown: Vec<String> = values
            .iter()
            .take(3)
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        if values.len() > 3 {
            shown.push("...".to_string());
        }
        return format!("<{}>", shown.join("|"));
    }

    match schema.get("type").and_then(|t| t.as_str()) {
        Some("string") => "<string>".to_string(),
        Some("number" | "integer") => "<number>".to_string(),
        Some("boolean") => "<true|false>".to_string(),
        _ => "<value>".to_string(),
    }
}
