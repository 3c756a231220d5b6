use std::str::FromStr;

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Quantization hint for local model loading
///
/// Selects which ONNX file variant is loaded. Remote providers ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dtype {
    #[default]
    Fp32,
    Fp16,
    Q8,
    Q4,
    Q4f16,
}

impl Dtype {
    pub const ALL: [Self; 5] = [Self::Fp32, Self::Fp16, Self::Q8, Self::Q4, Self::Q4f16];

    /// ONNX file name for this variant
    pub fn model_file(self) -> &'static str {
        match self {
            Self::Fp32 => "model.onnx",
            Self::Fp16 => "model_fp16.onnx",
            Self::Q8 => "model_q8.onnx",
            Self::Q4 => "model_q4.onnx",
            Self::Q4f16 => "model_q4f16.onnx",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Q8 => "q8",
            Self::Q4 => "q4",
            Self::Q4f16 => "q4f16",
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fp32" => Ok(Self::Fp32),
            "fp16" => Ok(Self::Fp16),
            "q8" => Ok(Self::Q8),
            "q4" => Ok(Self::Q4),
            "q4f16" => Ok(Self::Q4f16),
            other => Err(format!(
                "invalid dtype '{other}' (expected fp32, fp16, q8, q4, or q4f16)"
            )),
        }
    }
}

/// Contract every embedding provider implements
///
/// Providers are identified by a `location:model` tag and declare a fixed
/// output dimension. `initialize` is idempotent and may lazy-load a model or
/// verify credentials; `dispose` releases resources and is safe to repeat.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// `location:model` identifier
    fn tag(&self) -> &str;

    /// Output vector width
    fn dimension(&self) -> usize;

    async fn initialize(&self) -> Result<(), EmbeddingError>;

    /// Embed one text into a unit-norm vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch, preserving input order
    ///
    /// The default implementation falls back to sequential embedding.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    async fn dispose(&self);
}

/// Scale a vector to unit L2 norm in place; zero vectors are left untouched
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
