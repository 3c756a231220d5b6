use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::EmbeddingError;
use crate::local::LocalProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{Dtype, EmbeddingProvider};
use crate::voyage::VoyageProvider;

/// Provider used when no `--provider` flag is given
pub const DEFAULT_PROVIDER_TAG: &str = "local:all-minilm-l6-v2";

/// Constructs a provider for a given dtype hint
pub type ProviderFactory =
    Box<dyn Fn(Dtype) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> + Send + Sync>;

/// Tag-keyed factory registry for embedding providers
///
/// Ships the four built-in providers; custom factories can be added at
/// runtime under new tags (or override built-in ones).
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Registry pre-populated with the built-in providers
    ///
    /// `model_root` is where local model directories live.
    pub fn with_builtins(model_root: PathBuf) -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        let root = model_root.clone();
        registry.register("local:all-minilm-l6-v2", move |dtype| {
            Ok(Arc::new(LocalProvider::minilm(&root, dtype)))
        });

        let root = model_root;
        registry.register("local:embeddinggemma-256", move |dtype| {
            Ok(Arc::new(LocalProvider::embeddinggemma(&root, dtype)))
        });

        // Remote providers ignore the dtype hint
        registry.register("openai:text-embedding-3-small", |_| {
            Ok(Arc::new(OpenAiProvider::text_embedding_3_small()))
        });
        registry.register("voyage:voyage-3-lite", |_| {
            Ok(Arc::new(VoyageProvider::voyage_3_lite()))
        });

        registry
    }

    /// Add or replace a factory under a tag
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        factory: impl Fn(Dtype) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError>
        + Send
        + Sync
        + 'static,
    ) {
        self.factories.insert(tag.into(), Box::new(factory));
    }

    /// Produce a provider for `tag`
    pub fn create(
        &self,
        tag: &str,
        dtype: Dtype,
    ) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| EmbeddingError::UnknownProvider {
                tag: tag.to_string(),
            })?;
        factory(dtype)
    }

    /// All registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = ProviderRegistry::with_builtins(PathBuf::from("/models"));
        let tags = registry.tags();

        assert!(tags.contains(&"local:all-minilm-l6-v2"));
        assert!(tags.contains(&"local:embeddinggemma-256"));
        assert!(tags.contains(&"openai:text-embedding-3-small"));
        assert!(tags.contains(&"voyage:voyage-3-lite"));
        assert!(tags.contains(&DEFAULT_PROVIDER_TAG));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let registry = ProviderRegistry::with_builtins(PathBuf::from("/models"));
        let err = registry
            .create("local:made-up", Dtype::Fp32)
            .expect_err("unknown");
        assert!(err.to_string().contains("local:made-up"));
    }

    #[test]
    fn builtin_dimensions_are_declared() {
        let registry = ProviderRegistry::with_builtins(PathBuf::from("/models"));

        let minilm = registry
            .create("local:all-minilm-l6-v2", Dtype::Fp32)
            .expect("create");
        assert_eq!(minilm.dimension(), 384);

        let gemma = registry
            .create("local:embeddinggemma-256", Dtype::Fp32)
            .expect("create");
        assert_eq!(gemma.dimension(), 256);

        let openai = registry
            .create("openai:text-embedding-3-small", Dtype::Fp32)
            .expect("create");
        assert_eq!(openai.dimension(), 1536);

        let voyage = registry
            .create("voyage:voyage-3-lite", Dtype::Fp32)
            .expect("create");
        assert_eq!(voyage.dimension(), 512);
    }

    #[derive(Debug)]
    struct Custom;

    #[async_trait]
    impl EmbeddingProvider for Custom {
        fn tag(&self) -> &str {
            "custom:unit"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn initialize(&self) -> Result<(), EmbeddingError> {
            Ok(())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }

        async fn dispose(&self) {}
    }

    #[tokio::test]
    async fn custom_factories_can_be_registered() {
        let mut registry = ProviderRegistry::with_builtins(PathBuf::from("/models"));
        registry.register("custom:unit", |_| Ok(Arc::new(Custom)));

        let provider = registry.create("custom:unit", Dtype::Fp32).expect("create");
        assert_eq!(provider.embed("x").await.expect("embed"), vec![1.0, 0.0]);
    }
}
