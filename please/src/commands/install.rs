use std::path::PathBuf;

use please_config::PleaseDirs;
use serde_json::json;

use crate::args::{Ide, InstallArgs};

pub fn run(args: &InstallArgs) -> anyhow::Result<()> {
    let dirs = PleaseDirs::discover()?;

    let (path, servers_key) = target(&dirs, args.ide);

    let mut document: serde_json::Value = match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {e}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => json!({}),
        Err(e) => return Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    };

    let entry = json!({
        "command": "please",
        "args": ["serve"],
    });

    document
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("{} root must be a JSON object", path.display()))?
        .entry(servers_key)
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("{servers_key} must be a JSON object"))?
        .insert("please".to_string(), entry);

    std::fs::create_dir_all(path.parent().expect("install path has a parent"))?;
    std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;

    println!("Installed the gateway into {}", path.display());
    println!("Restart the IDE to pick it up");

    Ok(())
}

/// Per-IDE config location and the key its server map lives under
fn target(dirs: &PleaseDirs, ide: Ide) -> (PathBuf, &'static str) {
    match ide {
        Ide::Claude => (dirs.cwd().join(".mcp.json"), "mcpServers"),
        Ide::Cursor => (dirs.home().join(".cursor/mcp.json"), "mcpServers"),
        Ide::Vscode => (dirs.cwd().join(".vscode/mcp.json"), "servers"),
    }
}
