use please_config::{Authorization, ConfigResolver, ConfigScope, IndexScope, PleaseDirs};
use please_oauth::{OAuthManager, TokenStore};
use serde_json::json;
use url::Url;

use crate::args::{AuthArg, McpAddArgs, McpCommand, TransportArg};

pub async fn run(command: McpCommand) -> anyhow::Result<()> {
    let dirs = PleaseDirs::discover()?;

    match command {
        McpCommand::Add(args) => add(&dirs, args),
        McpCommand::Remove { name, scope } => remove(&dirs, &name, scope.into()),
        McpCommand::List => list(&dirs),
        McpCommand::Get { name } => get(&dirs, &name),
        McpCommand::Auth { name, revoke } => auth(&dirs, &name, revoke).await,
    }
}

/// Read a scope's config file as a raw JSON document, defaulting to an empty
/// server map. Editing the raw document preserves fields this version does
/// not model.
fn read_raw(dirs: &PleaseDirs, scope: ConfigScope) -> anyhow::Result<serde_json::Value> {
    let path = dirs.config_path(scope);
    match std::fs::read_to_string(&path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {e}", path.display()))?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(json!({ "mcpServers": {} })),
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}

fn write_raw(
    dirs: &PleaseDirs,
    scope: ConfigScope,
    document: &serde_json::Value,
) -> anyhow::Result<()> {
    let path = dirs.config_path(scope);
    std::fs::create_dir_all(path.parent().expect("config path has a parent"))?;
    std::fs::write(&path, serde_json::to_string_pretty(document)?)?;

    if scope == ConfigScope::Local {
        dirs.ensure_local_gitignore()?;
    }

    Ok(())
}

fn add(dirs: &PleaseDirs, args: McpAddArgs) -> anyhow::Result<()> {
    if args.command.is_none() && args.url.is_none() {
        anyhow::bail!("server '{}' needs --command or --url", args.name);
    }

    let mut server = serde_json::Map::new();

    if let Some(command) = &args.command {
        server.insert("command".into(), json!(command));
        if !args.args.is_empty() {
            server.insert("args".into(), json!(args.args));
        }
    }

    if !args.env.is_empty() {
        let mut env = serde_json::Map::new();
        for entry in &args.env {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--env entries must be KEY=VALUE, got '{entry}'"))?;
            env.insert(key.to_string(), json!(value));
        }
        server.insert("env".into(), serde_json::Value::Object(env));
    }

    if let Some(url) = &args.url {
        // Validate eagerly so a typo fails here, not at discovery time
        let _: Url = url.parse()?;
        server.insert("url".into(), json!(url));
    }

    if let Some(transport) = args.transport {
        let name = match transport {
            TransportArg::Stdio => "stdio",
            TransportArg::Http => "http",
            TransportArg::Sse => "sse",
        };
        server.insert("transport".into(), json!(name));
    }

    match args.auth {
        AuthArg::None => {}
        AuthArg::Bearer => {
            let token = args
                .token
                .ok_or_else(|| anyhow::anyhow!("--auth bearer requires --token"))?;
            server.insert(
                "authorization".into(),
                json!({ "type": "bearer", "token": token }),
            );
        }
        AuthArg::Oauth2 => {
            let mut authorization = serde_json::Map::new();
            authorization.insert("type".into(), json!("oauth2"));
            if !args.oauth_scopes.is_empty() {
                authorization.insert("oauth".into(), json!({ "scopes": args.oauth_scopes }));
            }
            server.insert(
                "authorization".into(),
                serde_json::Value::Object(authorization),
            );
        }
    }

    let scope: ConfigScope = args.scope.into();
    let mut document = read_raw(dirs, scope)?;

    document
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("config root must be a JSON object"))?
        .entry("mcpServers")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("mcpServers must be a JSON object"))?
        .insert(args.name.clone(), serde_json::Value::Object(server));

    write_raw(dirs, scope, &document)?;
    println!("Added '{}' to the {scope} scope", args.name);
    println!("Run `please index` to pick up its tools");

    Ok(())
}

fn remove(dirs: &PleaseDirs, name: &str, scope: ConfigScope) -> anyhow::Result<()> {
    let mut document = read_raw(dirs, scope)?;

    let removed = document
        .get_mut("mcpServers")
        .and_then(|s| s.as_object_mut())
        .and_then(|servers| servers.remove(name));

    if removed.is_none() {
        anyhow::bail!("server '{name}' is not configured in the {scope} scope");
    }

    write_raw(dirs, scope, &document)?;
    println!("Removed '{name}' from the {scope} scope");

    Ok(())
}

fn list(dirs: &PleaseDirs) -> anyhow::Result<()> {
    let resolver = ConfigResolver::new(dirs.clone());
    let merged = resolver.merged(IndexScope::All);

    if merged.is_empty() {
        println!("No upstream servers configured; add one with `please mcp add`");
        return Ok(());
    }

    for (name, server) in &merged {
        let endpoint = server
            .url
            .as_ref()
            .map(Url::to_string)
            .or_else(|| server.command.clone())
            .unwrap_or_else(|| "<unconfigured>".to_string());

        let auth = match server.authorization() {
            Authorization::None => "none",
            Authorization::Bearer { .. } => "bearer",
            Authorization::Oauth2 { .. } => "oauth2",
        };

        println!("{name}\t{endpoint}\tauth={auth}");
    }

    Ok(())
}

fn get(dirs: &PleaseDirs, name: &str) -> anyhow::Result<()> {
    // Raw documents, searched in reverse merge order so the winner prints
    for scope in [ConfigScope::Local, ConfigScope::Project, ConfigScope::User] {
        let document = read_raw(dirs, scope)?;
        if let Some(server) = document.get("mcpServers").and_then(|s| s.get(name)) {
            println!("# scope: {scope}");
            println!("{}", serde_json::to_string_pretty(server)?);
            return Ok(());
        }
    }

    anyhow::bail!("server '{name}' is not configured; add it with `please mcp add {name}`");
}

async fn auth(dirs: &PleaseDirs, name: &str, revoke: bool) -> anyhow::Result<()> {
    let resolver = ConfigResolver::new(dirs.clone());
    let server = resolver.find_server(IndexScope::All, name)?;

    let url = server
        .url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("server '{name}' has no url; OAuth needs a remote server"))?;

    let options = match server.authorization() {
        Authorization::Oauth2 { oauth } => oauth.clone().unwrap_or_default(),
        _ => anyhow::bail!(
            "server '{name}' is not configured for oauth2; set `--auth oauth2` on `please mcp add`"
        ),
    };

    let manager = OAuthManager::new(name, url, options, TokenStore::new(dirs.oauth_root()));

    if revoke {
        manager.revoke()?;
        println!("Cleared the stored session for '{name}'");
        return Ok(());
    }

    manager.authorize().await?;
    println!("Authorized '{name}'; tokens are stored for future runs");

    Ok(())
}
