use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;
use crate::provider::{EmbeddingProvider, l2_normalize};

/// Default Voyage AI API base URL
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";

/// Remote embeddings via the Voyage AI API
pub struct VoyageProvider {
    tag: String,
    model: String,
    dimension: usize,
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl VoyageProvider {
    /// `voyage:voyage-3-lite`, 512 dimensions
    ///
    /// Reads `VOYAGE_API_KEY` at construction; `initialize` fails when it is
    /// absent.
    pub fn voyage_3_lite() -> Self {
        Self::new("voyage-3-lite", 512, None)
    }

    pub fn new(model: impl Into<String>, dimension: usize, base_url: Option<String>) -> Self {
        let model = model.into();
        Self {
            tag: format!("voyage:{model}"),
            model,
            dimension,
            client: Client::new(),
            api_key: std::env::var("VOYAGE_API_KEY").ok().map(SecretString::from),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn api_key(&self) -> Result<&SecretString, EmbeddingError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::MissingCredentials {
                provider: self.tag.clone(),
                var: "VOYAGE_API_KEY",
            })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let wire_request = WireRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
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
impl EmbeddingProvider for VoyageProvider {
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
