use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::IndexError;
use crate::types::{BuildMetadata, INDEX_VERSION, PersistedIndex};

/// Index header without the tools array
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_tools: u64,
    pub has_embeddings: bool,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,
    #[serde(default)]
    pub build_metadata: Option<BuildMetadata>,
}

/// Persists the index as a single JSON document at a scope-derived path
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a loadable index exists
    ///
    /// Any load failure (missing, corrupt, version-incompatible) reads as
    /// "does not exist" so the rebuild gate treats them all the same way.
    pub fn exists(&self) -> bool {
        self.load().is_ok()
    }

    /// Load and validate the full index document
    pub fn load(&self) -> Result<PersistedIndex, IndexError> {
        let raw = self.read_raw()?;

        let index: PersistedIndex =
            serde_json::from_str(&raw).map_err(|source| IndexError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        check_version(&index.version)?;
        Ok(index)
    }

    /// Load the header without validating the tools array
    pub fn metadata(&self) -> Result<IndexMetadata, IndexError> {
        let raw = self.read_raw()?;

        let metadata: IndexMetadata =
            serde_json::from_str(&raw).map_err(|source| IndexError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        check_version(&metadata.version)?;
        Ok(metadata)
    }

    /// Write the index atomically: temp file in the target directory, then
    /// rename over the destination.
    pub fn save(&self, index: &PersistedIndex) -> Result<(), IndexError> {
        let dir = self
            .path
            .parent()
            .expect("index path always has a parent directory");

        std::fs::create_dir_all(dir).map_err(|source| IndexError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let body = serde_json::to_vec(index).expect("index serializes");
        let tmp = self.path.with_extension("json.tmp");

        std::fs::write(&tmp, body).map_err(|source| IndexError::Io {
            path: tmp.clone(),
            source,
        })?;

        std::fs::rename(&tmp, &self.path).map_err(|source| IndexError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "index written");
        Ok(())
    }

    /// Write a zero-tool index and return it
    pub fn create_empty(
        &self,
        build_metadata: Option<BuildMetadata>,
    ) -> Result<PersistedIndex, IndexError> {
        let index = PersistedIndex::empty(build_metadata);
        self.save(&index)?;
        Ok(index)
    }

    fn read_raw(&self) -> Result<String, IndexError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IndexError::NotFound {
                path: self.path.clone(),
            }),
            Err(source) => Err(IndexError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Major-version gate: minor and patch drift loads fine, a major mismatch is
/// a hard error.
fn check_version(found: &str) -> Result<(), IndexError> {
    let major = |v: &str| v.split('.').next().map(str::to_string);

    if major(found) != major(INDEX_VERSION) {
        return Err(IndexError::VersionMismatch {
            found: found.to_string(),
            expected: INDEX_VERSION.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use please_mcp::ToolDefinition;

    use super::*;
    use crate::builder::index_tool;
    use crate::types::Bm25Stats;

    fn sample_index() -> PersistedIndex {
        let tool = index_tool(ToolDefinition {
            name: "fs__read_file".into(),
            title: None,
            description: "Read a file".into(),
            input_schema: serde_json::json!({ "type": "object" }),
            output_schema: None,
            metadata: None,
        });

        let mut index = PersistedIndex::empty(None);
        index.bm25_stats = crate::builder::compute_bm25_stats(std::slice::from_ref(&tool));
        index.tools = vec![tool];
        index.total_tools = 1;
        index
    }

    fn store() -> (tempfile::TempDir, IndexStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::new(tmp.path().join(".please/mcp/index.json"));
        (tmp, store)
    }

    #[test]
    fn save_then_load_roundtrips() {
        let (_tmp, store) = store();
        let index = sample_index();

        store.save(&index).expect("save");
        let loaded = store.load().expect("load");

        assert_eq!(loaded.total_tools, 1);
        assert_eq!(loaded.tools[0].tool.name, "fs__read_file");
        assert_eq!(loaded.bm25_stats, index.bm25_stats);
        assert!(store.exists());
    }

    #[test]
    fn missing_file_reads_as_not_found() {
        let (_tmp, store) = store();

        assert!(!store.exists());
        assert!(matches!(store.load(), Err(IndexError::NotFound { .. })));
    }

    #[test]
    fn corrupt_file_reads_as_corrupt_and_does_not_exist() {
        let (_tmp, store) = store();
        std::fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(store.path(), "{ not json").expect("write");

        assert!(matches!(store.load(), Err(IndexError::Corrupt { .. })));
        assert!(!store.exists());
    }

    #[test]
    fn major_version_mismatch_is_a_hard_error() {
        let (_tmp, store) = store();
        let mut index = sample_index();
        index.version = "2.0.0".into();
        store.save(&index).expect("save");

        assert!(matches!(
            store.load(),
            Err(IndexError::VersionMismatch { .. })
        ));
        assert!(!store.exists());
    }

    #[test]
    fn minor_version_drift_loads_fine() {
        let (_tmp, store) = store();
        let mut index = sample_index();
        index.version = "1.7.3".into();
        store.save(&index).expect("save");

        assert!(store.load().is_ok());
    }

    #[test]
    fn create_empty_serves_zero_tools() {
        let (_tmp, store) = store();
        store.create_empty(None).expect("create");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.total_tools, 0);
        assert_eq!(loaded.bm25_stats, Bm25Stats::default());
        assert!(store.exists());
    }

    #[test]
    fn metadata_exposes_the_header() {
        let (_tmp, store) = store();
        store.save(&sample_index()).expect("save");

        let metadata = store.metadata().expect("metadata");
        assert_eq!(metadata.version, INDEX_VERSION);
        assert_eq!(metadata.total_tools, 1);
        assert!(!metadata.has_embeddings);
    }
}
