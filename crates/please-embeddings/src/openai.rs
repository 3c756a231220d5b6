use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;
use crate::provider::{EmbeddingProvider, l2_normalize};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Remote embeddings via the `OpenAI` API
pub struct OpenAiProvider {
    tag: String,
    model: String,
    dimension: usize,
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl OpenAiProvider {
    /// `openai:text-embedding-3-small`, 1536 dimensions
    ///
    /// Reads `OPENAI_API_KEY` at construction; `initialize` fails when it is
    /// absent.
    pub fn text_embedding_3_small() -> Self {
        Self::new("text-embedding-3-small", 1536, None)
    }

    pub fn new(model: impl Into<String>, dimension: usize, base_url: Option<String>) -> Self {
        let model = model.into();
        Self {
            tag: format!("openai:{model}"),
            model,
            dimension,
            client: Client::new(),
            api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Point at a different endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<&SecretString, EmbeddingError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::MissingCredentials {
                provider: self.tag.clone(),
                var: "OPENAI_API_KEY",
            })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let wire_request = WireRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
            encoding_format: "float",
        };

        tracing::debug!(provider = %self.tag, texts = texts.len(), "sending embeddings request");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key()?.expose_secret()),
            )
            .json(&wire_request)
            .send()
            .await
            .map_err(|source| EmbeddingError::Connection {
                provider: self.tag.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                provider: self.tag.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let wire_response: WireResponse =
            response
                .json()
                .await
                .map_err(|source| EmbeddingError::Connection {
                    provider: self.tag.clone(),
                    source,
                })?;

        // The API returns entries with explicit indices; order by them
        let mut data = wire_response.data;
        data.sort_by_key(|d| d.index);

        data.into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        got: d.embedding.len(),
                        expected: self.dimension,
                    });
                }
                let mut vector = d.embedding;
                l2_normalize(&mut vector);
                Ok(vector)
            })
            .collect()
    }
}

/// Wire format for the embeddings request
#[derive(Serialize)]
struct WireRequest {
    input: Vec<String>,
    model: String,
    encoding_format: &'static str,
}

/// Wire format for the embeddings response
#[derive(Deserialize)]
struct WireResponse {
    data: Vec<WireEmbedding>,
}

#[derive(Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.api_key().map(|_| ())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vectors = self.request(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Api {
                provider: self.tag.clone(),
                status: 200,
                message: "empty embedding response".into(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    async fn dispose(&self) {}
}
