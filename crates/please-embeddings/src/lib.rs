#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Dense-vector embedding providers behind a tag-keyed registry
//!
//! Two local ONNX providers and two remote API providers; all produce
//! unit-norm vectors of a fixed, declared dimension.

mod error;
mod local;
mod openai;
mod provider;
mod registry;
mod voyage;

pub use error::EmbeddingError;
pub use local::{LocalProvider, truncate_and_renormalize};
pub use openai::OpenAiProvider;
pub use provider::{Dtype, EmbeddingProvider, l2_normalize};
pub use registry::{DEFAULT_PROVIDER_TAG, ProviderFactory, ProviderRegistry};
pub use voyage::VoyageProvider;
