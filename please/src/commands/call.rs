use std::io::Read;

use please_config::{ConfigResolver, IndexScope, PleaseDirs};
use please_index::{IndexStore, merge_indexed_tools};
use please_mcp::{ToolDefinition, ToolExecutor};

use crate::args::{CallArgs, CallFormat};

pub async fn run(args: CallArgs) -> anyhow::Result<()> {
    let dirs = PleaseDirs::discover()?;
    let resolver = ConfigResolver::new(dirs.clone());

    let arguments = read_arguments(args.args.as_deref())?;
    let tools = load_tools(&dirs, &args)?;

    let executor = ToolExecutor::new(resolver.merged(IndexScope::All), dirs.oauth_root());

    let result = match executor.execute(&tools, &args.tool, arguments).await {
        Ok(result) => result,
        Err(failure) => {
            eprintln!("{}: {failure}", failure.code());
            if let Some(hint) = failure.hint() {
                eprintln!("hint: {hint}");
            }
            std::process::exit(1);
        }
    };

    let is_error = result.is_error.unwrap_or(false);

    match args.format {
        CallFormat::Json => {
            let value = serde_json::to_value(&result)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        CallFormat::Minimal => {
            for content in &result.content {
                if let rmcp::model::RawContent::Text(text) = &content.raw {
                    println!("{}", text.text);
                }
            }
        }
    }

    // The upstream's own error flag drives the exit code too
    if is_error {
        std::process::exit(1);
    }

    Ok(())
}

/// `--args` JSON, or stdin when the flag is omitted
fn read_arguments(
    flag: Option<&str>,
) -> anyhow::Result<Option<serde_json::Map<String, serde_json::Value>>> {
    let raw = match flag {
        Some(raw) => raw.to_string(),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| anyhow::anyhow!("arguments are not valid JSON: {e}"))?;

    match value {
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => anyhow::bail!("arguments must be a JSON object, got {other}"),
    }
}

/// The merged tool list the executor resolves against
fn load_tools(dirs: &PleaseDirs, args: &CallArgs) -> anyhow::Result<Vec<ToolDefinition>> {
    let indexed = if let Some(path) = &args.index {
        IndexStore::new(path).load()?.tools
    } else {
        let load = |scope: IndexScope| {
            IndexStore::new(dirs.index_path(scope))
                .load()
                .map(|i| i.tools)
                .unwrap_or_default()
        };
        merge_indexed_tools(load(IndexScope::Project), load(IndexScope::User))
    };

    Ok(indexed.into_iter().map(|t| t.tool).collect())
}
