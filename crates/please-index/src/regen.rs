use please_config::{ConfigFingerprint, ConfigScope, IndexScope, ScopeFingerprints};

use crate::store::IndexStore;
use crate::types::CliArgs;

/// Verdict of the staleness check, with human-readable reasons
#[derive(Debug)]
pub struct RegenerationCheck {
    pub needs_rebuild: bool,
    pub reasons: Vec<String>,
}

impl RegenerationCheck {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            needs_rebuild: !reasons.is_empty(),
            reasons,
        }
    }
}

/// The environment a rebuild decision is made against
pub struct CurrentBuildInputs<'a> {
    pub cli_version: &'a str,
    pub cli_args: CliArgs,
    pub fingerprints: &'a ScopeFingerprints,
    /// Controls which config fingerprints are considered; `None` checks all
    /// three scopes.
    pub scope: Option<IndexScope>,
}

/// Decide whether the index at `store` must be rebuilt
///
/// Pure over its inputs: build metadata fully determines staleness, with no
/// hidden state. The verdict is "rebuild iff any reason was collected".
pub fn check_index_regeneration(
    store: &IndexStore,
    current: &CurrentBuildInputs<'_>,
) -> RegenerationCheck {
    let metadata = match store.metadata() {
        Ok(metadata) => metadata,
        Err(crate::IndexError::NotFound { .. }) => {
            return RegenerationCheck::from_reasons(vec!["Index not found".to_string()]);
        }
        Err(e) => {
            return RegenerationCheck::from_reasons(vec![format!("Index corrupted: {e}")]);
        }
    };

    let Some(build) = metadata.build_metadata else {
        return RegenerationCheck::from_reasons(vec![
            "Index has legacy format (no build metadata)".to_string(),
        ]);
    };

    let mut reasons = Vec::new();

    if build.cli_version != current.cli_version {
        reasons.push(format!(
            "CLI version changed ({} -> {})",
            build.cli_version, current.cli_version
        ));
    }

    if build.cli_args.mode != current.cli_args.mode {
        reasons.push(format!(
            "Search mode changed ({} -> {})",
            display_option(&build.cli_args.mode),
            display_option(&current.cli_args.mode)
        ));
    }

    if build.cli_args.provider != current.cli_args.provider {
        reasons.push(format!(
            "Embedding provider changed ({} -> {})",
            display_option(&build.cli_args.provider),
            display_option(&current.cli_args.provider)
        ));
    }

    if build.cli_args.dtype != current.cli_args.dtype {
        reasons.push(format!(
            "Model dtype changed ({} -> {})",
            display_option(&build.cli_args.dtype),
            display_option(&current.cli_args.dtype)
        ));
    }

    if !exclude_lists_equal(
        build.cli_args.exclude.as_deref(),
        current.cli_args.exclude.as_deref(),
    ) {
        reasons.push("Exclude list changed".to_string());
    }

    let scopes: &[ConfigScope] = current
        .scope
        .map_or(ConfigScope::MERGE_ORDER.as_slice(), IndexScope::config_scopes);

    for &scope in scopes {
        if let Some(reason) = fingerprint_transition(
            scope,
            build.config_fingerprints.get(scope),
            current.fingerprints.get(scope),
        ) {
            reasons.push(reason);
        }
    }

    RegenerationCheck::from_reasons(reasons)
}

/// The four fingerprint transitions; only present→present with an equal
/// hash is quiet.
fn fingerprint_transition(
    scope: ConfigScope,
    stored: &ConfigFingerprint,
    current: &ConfigFingerprint,
) -> Option<String> {
    match (stored.exists, current.exists) {
        (false, false) => None,
        (false, true) => Some(format!("{scope} config added")),
        (true, false) => Some(format!("{scope} config removed")),
        (true, true) if stored.hash != current.hash => {
            Some(format!("{scope} config content changed"))
        }
        (true, true) => None,
    }
}

/// Exclude lists compare as sorted multisets; order never matters
fn exclude_lists_equal(stored: Option<&[String]>, current: Option<&[String]>) -> bool {
    fn normalize(list: Option<&[String]>) -> Vec<&String> {
        let mut sorted: Vec<&String> = list.unwrap_or(&[]).iter().collect();
        sorted.sort_unstable();
        sorted
    }

    normalize(stored) == normalize(current)
}

fn display_option(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("none")
}

#[cfg(test)]
mod tests {
    use please_config::ConfigFingerprint;
    use please_mcp::ToolDefinition;

    use super::*;
    use crate::builder::index_tool;
    use crate::types::{BuildMetadata, PersistedIndex};

    fn fingerprints(project_bytes: Option<&[u8]>) -> ScopeFingerprints {
        ScopeFingerprints {
            user: ConfigFingerprint::absent(),
            project: project_bytes.map_or_else(ConfigFingerprint::absent, |b| {
                ConfigFingerprint::of_bytes(b)
            }),
            local: ConfigFingerprint::absent(),
        }
    }

    fn args(dtype: &str) -> CliArgs {
        CliArgs {
            mode: Some("hybrid".into()),
            provider: Some("local:all-minilm-l6-v2".into()),
            dtype: Some(dtype.into()),
            exclude: Some(vec!["slow-server".into()]),
            scope: Some("project".into()),
        }
    }

    fn saved_store(metadata: Option<BuildMetadata>) -> (tempfile::TempDir, IndexStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::new(tmp.path().join("index.json"));

        let mut index = PersistedIndex::empty(metadata);
        index.tools = vec![index_tool(ToolDefinition {
            name: "fs__read".into(),
            title: None,
            description: "Read".into(),
            input_schema: serde_json::json!({}),
            output_schema: None,
            metadata: None,
        })];
        index.total_tools = 1;
        store.save(&index).expect("save");

        (tmp, store)
    }

    #[test]
    fn missing_index_needs_rebuild() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::new(tmp.path().join("index.json"));
        let fps = fingerprints(None);

        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: CliArgs::default(),
                fingerprints: &fps,
                scope: None,
            },
        );

        assert!(check.needs_rebuild);
        assert!(check.reasons[0].contains("not found"));
    }

    #[test]
    fn corrupt_index_needs_rebuild() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("index.json");
        std::fs::write(&path, "{ broken").expect("write");
        let store = IndexStore::new(path);
        let fps = fingerprints(None);

        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: CliArgs::default(),
                fingerprints: &fps,
                scope: None,
            },
        );

        assert!(check.needs_rebuild);
        assert!(check.reasons[0].contains("corrupted"));
    }

    #[test]
    fn legacy_index_without_metadata_needs_rebuild() {
        let (_tmp, store) = saved_store(None);
        let fps = fingerprints(None);

        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: CliArgs::default(),
                fingerprints: &fps,
                scope: None,
            },
        );

        assert!(check.needs_rebuild);
        assert!(check.reasons[0].contains("legacy"));
    }

    #[test]
    fn unchanged_environment_needs_no_rebuild() {
        let fps = fingerprints(Some(b"{}"));
        let (_tmp, store) = saved_store(Some(BuildMetadata {
            cli_version: "1.0.0".into(),
            cli_args: args("fp32"),
            config_fingerprints: fps.clone(),
        }));

        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: args("fp32"),
                fingerprints: &fps,
                scope: None,
            },
        );

        assert!(!check.needs_rebuild);
        assert!(check.reasons.is_empty());
    }

    #[test]
    fn dtype_change_is_detected() {
        let fps = fingerprints(Some(b"{}"));
        let (_tmp, store) = saved_store(Some(BuildMetadata {
            cli_version: "1.0.0".into(),
            cli_args: args("fp32"),
            config_fingerprints: fps.clone(),
        }));

        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: args("fp16"),
                fingerprints: &fps,
                scope: None,
            },
        );

        assert!(check.needs_rebuild);
        assert!(check.reasons.iter().any(|r| r.contains("Model dtype changed")));
    }

    #[test]
    fn exclude_list_order_is_irrelevant() {
        let fps = fingerprints(Some(b"{}"));
        let mut stored_args = args("fp32");
        stored_args.exclude = Some(vec!["b".into(), "a".into()]);

        let (_tmp, store) = saved_store(Some(BuildMetadata {
            cli_version: "1.0.0".into(),
            cli_args: stored_args,
            config_fingerprints: fps.clone(),
        }));

        let mut current_args = args("fp32");
        current_args.exclude = Some(vec!["a".into(), "b".into()]);

        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: current_args,
                fingerprints: &fps,
                scope: None,
            },
        );

        assert!(!check.needs_rebuild);
    }

    #[test]
    fn fingerprint_transitions_produce_reasons() {
        let stored = fingerprints(Some(b"old"));
        let (_tmp, store) = saved_store(Some(BuildMetadata {
            cli_version: "1.0.0".into(),
            cli_args: args("fp32"),
            config_fingerprints: stored,
        }));

        // content changed
        let changed = fingerprints(Some(b"new"));
        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: args("fp32"),
                fingerprints: &changed,
                scope: None,
            },
        );
        assert!(check
            .reasons
            .iter()
            .any(|r| r.contains("project config content changed")));

        // removed
        let removed = fingerprints(None);
        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: args("fp32"),
                fingerprints: &removed,
                scope: None,
            },
        );
        assert!(check.reasons.iter().any(|r| r.contains("project config removed")));

        // added (user scope appears)
        let mut added = fingerprints(Some(b"old"));
        added.user = ConfigFingerprint::of_bytes(b"{}");
        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: args("fp32"),
                fingerprints: &added,
                scope: None,
            },
        );
        assert!(check.reasons.iter().any(|r| r.contains("user config added")));
    }

    #[test]
    fn user_scope_ignores_project_fingerprints() {
        let stored = fingerprints(Some(b"old"));
        let (_tmp, store) = saved_store(Some(BuildMetadata {
            cli_version: "1.0.0".into(),
            cli_args: args("fp32"),
            config_fingerprints: stored,
        }));

        // Project file changed, but a user-scoped check only looks at user
        let changed = fingerprints(Some(b"new"));
        let check = check_index_regeneration(
            &store,
            &CurrentBuildInputs {
                cli_version: "1.0.0",
                cli_args: args("fp32"),
                fingerprints: &changed,
                scope: Some(IndexScope::User),
            },
        );

        assert!(!check.needs_rebuild);
    }

    #[test]
    fn verdict_matches_reason_presence() {
        let fps = fingerprints(Some(b"{}"));
        let (_tmp, store) = saved_store(Some(BuildMetadata {
            cli_version: "1.0.0".into(),
            cli_args: args("fp32"),
            config_fingerprints: fps.clone(),
        }));

        for (version, expect) in [("1.0.0", false), ("1.1.0", true)] {
            let check = check_index_regeneration(
                &store,
                &CurrentBuildInputs {
                    cli_version: version,
                    cli_args: args("fp32"),
                    fingerprints: &fps,
                    scope: None,
                },
            );
            assert_eq!(check.needs_rebuild, expect);
            assert_eq!(check.needs_rebuild, !check.reasons.is_empty());
        }
    }
}
