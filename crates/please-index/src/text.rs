use please_mcp::ToolDefinition;

/// Flatten a tool's descriptive surface into one searchable string
///
/// Concatenates, space-separated: the identifier-split name, the optional
/// title, the description, every input-schema property (name plus a
/// recursive flattening of its schema), and stringified metadata tags.
/// Deterministic for a given definition.
pub fn searchable_text(tool: &ToolDefinition) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(split_identifier(&tool.name));

    if let Some(title) = &tool.title {
        parts.push(title.clone());
    }

    if !tool.description.is_empty() {
        parts.push(tool.description.clone());
    }

    if let Some(properties) = tool.input_schema.get("properties").and_then(|p| p.as_object()) {
        for (name, schema) in properties {
            parts.push(split_identifier(name));
            flatten_schema(schema, &mut parts);
        }
    }

    if let Some(tags) = tool.metadata.as_ref().and_then(|m| m.get("tags")) {
        parts.push(stringify_tags(tags));
    }

    parts.retain(|p| !p.is_empty());
    parts.join(" ").to_lowercase()
}

/// Recursive flattening of a JSON-Schema node: description, type name, enum
/// values, nested properties, array items.
fn flatten_schema(schema: &serde_json::Value, parts: &mut Vec<String>) {
    let Some(object) = schema.as_object() else {
        return;
    };

    if let Some(description) = object.get("description").and_then(|d| d.as_str()) {
        parts.push(description.to_string());
    }

    if let Some(type_name) = object.get("type").and_then(|t| t.as_str()) {
        parts.push(type_name.to_string());
    }

    if let Some(values) = object.get("enum").and_then(|e| e.as_array()) {
        for value in values {
            match value {
                serde_json::Value::String(s) => parts.push(s.clone()),
                other => parts.push(other.to_string()),
            }
        }
    }

    if let Some(properties) = object.get("properties").and_then(|p| p.as_object()) {
        for (name, nested) in properties {
            parts.push(split_identifier(name));
            flatten_schema(nested, parts);
        }
    }

    if let Some(items) = object.get("items") {
        flatten_schema(items, parts);
    }
}

/// Render metadata tags as plain text
fn stringify_tags(tags: &serde_json::Value) -> String {
    match tags {
        serde_json::Value::Array(values) => values
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Break an identifier into words: camelCase boundaries and `_`/`-` become
/// spaces, everything is lowercased.
fn split_identifier(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut prev_lower_or_digit = false;

    for c in identifier.chars() {
        if c == '_' || c == '-' {
            out.push(' ');
            prev_lower_or_digit = false;
            continue;
        }

        if c.is_uppercase() && prev_lower_or_digit {
            out.push(' ');
        }

        prev_lower_or_digit = c.is_lowercase() || c.is_ascii_digit();
        out.extend(c.to_lowercase());
    }

    out
}
