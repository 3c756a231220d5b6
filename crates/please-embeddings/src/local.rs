use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;

use crate::error::EmbeddingError;
use crate::provider::{Dtype, EmbeddingProvider, l2_normalize};

/// Sequence-length cap for the supported sentence-embedding models
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Matryoshka truncation: keep the leading `dimension` components and rescale
/// to unit norm. A zero-norm prefix is returned as-is.
pub fn truncate_and_renormalize(vector: &[f32], dimension: usize) -> Vec<f32> {
    let mut truncated = vector[..dimension.min(vector.len())].to_vec();
    l2_normalize(&mut truncated);
    truncated
}

/// ONNX encoder: tokenize, run the session, mean-pool, L2-normalize
struct LocalEncoder {
    session: Session,
    tokenizer: Tokenizer,
    wants_token_types: bool,
}

impl LocalEncoder {
    fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self, EmbeddingError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

        let model_bytes =
            std::fs::read(model_path).map_err(|_| EmbeddingError::ModelNotFound {
                path: model_path.to_path_buf(),
            })?;

        let session = Session::builder()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?
            .with_intra_threads(4)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let wants_token_types = session.inputs().iter().any(|i| i.name() == "token_type_ids");

        Ok(Self {
            session,
            tokenizer,
            wants_token_types,
        })
    }

    /// Encode a batch of texts into unit-norm vectors of the model's width
    fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(MAX_SEQUENCE_LENGTH))
            .max()
            .unwrap_or(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let outputs = if self.wants_token_types {
            let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            self.session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
        } else {
            self.session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
            ])
        }
        .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let hidden_state = outputs.get("last_hidden_state").ok_or_else(|| {
            EmbeddingError::Inference("model has no 'last_hidden_state' output".into())
        })?;

        let (shape_info, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let hidden_size = shape_info[2] as usize;

        // Mean pooling over non-padding tokens, then L2 normalization
        let mut vectors = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;

            for j in 0..max_len {
                if attention_mask[i * max_len + j] == 1 {
                    let base = i * max_len * hidden_size + j * hidden_size;
                    for (k, value) in sum.iter_mut().enumerate() {
                        *value += data[base + k];
                    }
                    count += 1.0;
                }
            }

            if count > 0.0 {
                for value in &mut sum {
                    *value /= count;
                }
            }

            l2_normalize(&mut sum);
            vectors.push(sum);
        }

        Ok(vectors)
    }
}

/// Local ONNX embedding provider
///
/// Loads `<model_root>/<model>/<dtype variant>` lazily on first use. When
/// `dimension` is narrower than the model's native width the output is
/// Matryoshka-truncated and re-normalized.
pub struct LocalProvider {
    tag: String,
    model_dir: PathBuf,
    dtype: Dtype,
    dimension: usize,
    encoder: Mutex<Option<LocalEncoder>>,
}

impl LocalProvider {
    /// 384-dim general-purpose sentence encoder
    pub fn minilm(model_root: &Path, dtype: Dtype) -> Self {
        Self::new(
            "local:all-minilm-l6-v2",
            model_root.join("all-minilm-l6-v2"),
            dtype,
            384,
        )
    }

    /// 256-dim retrieval-tuned encoder, truncated from a 768-dim base model
    pub fn embeddinggemma(model_root: &Path, dtype: Dtype) -> Self {
        Self::new(
            "local:embeddinggemma-256",
            model_root.join("embeddinggemma-300m"),
            dtype,
            256,
        )
    }

    pub fn new(
        tag: impl Into<String>,
        model_dir: PathBuf,
        dtype: Dtype,
        dimension: usize,
    ) -> Self {
        Self {
            tag: tag.into(),
            model_dir,
            dtype,
            dimension,
            encoder: Mutex::new(None),
        }
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut guard = self.encoder.lock().await;

        if guard.is_none() {
            *guard = Some(self.load_encoder()?);
        }

        let encoder = guard.as_mut().expect("encoder just initialized");
        let raw = encoder.encode_batch(texts)?;

        Ok(raw
            .into_iter()
            .map(|v| {
                if v.len() > self.dimension {
                    truncate_and_renormalize(&v, self.dimension)
                } else {
                    v
                }
            })
            .collect())
    }

    fn load_encoder(&self) -> Result<LocalEncoder, EmbeddingError> {
        let model_path = self.model_dir.join(self.dtype.model_file());
        let tokenizer_path = self.model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EmbeddingError::ModelNotFound { path: model_path });
        }

        tracing::info!(
            tag = %self.tag,
            model = %model_path.display(),
            dtype = %self.dtype,
            "loading local embedding model"
        );

        LocalEncoder::load(&model_path, &tokenizer_path)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        let mut guard = self.encoder.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_encoder()?);
        }
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vectors = self.encode(&[text.to_string()]).await?;
        Ok(vectors.into_iter().next().expect("one vector per text"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.encode(texts).await
    }

    async fn dispose(&self) {
        self.encoder.lock().await.take();
    }
}
