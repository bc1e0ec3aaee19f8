//! Embedding collaborators.
//!
//! Two vector spaces are in play: the text space used by the document,
//! audio and note stores, and the cross-modal (text-to-image) space used by
//! the image store. [`Embedders`] carries one provider per space so callers
//! cannot query the image store with a plain text vector.

mod ollama;
mod trigram;

pub use ollama::OllamaProvider;
pub use trigram::TrigramProvider;

use crate::types::Modality;
use mosaic_core::config::{EmbedderConfig, EmbeddingsConfig};
use mosaic_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g. "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from configuration.
pub fn create_provider(config: &EmbedderConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(
            config.model.clone(),
            config.dimensions,
        ))),

        "ollama" => Ok(Arc::new(OllamaProvider::new(
            config.endpoint.as_deref(),
            config.model.clone(),
            config.dimensions,
            Duration::from_secs(config.timeout_secs),
        )?)),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

/// The text embedder and the cross-modal (text-to-image) embedder.
#[derive(Debug, Clone)]
pub struct Embedders {
    pub text: Arc<dyn EmbeddingProvider>,
    pub cross_modal: Arc<dyn EmbeddingProvider>,
}

impl Embedders {
    pub fn new(text: Arc<dyn EmbeddingProvider>, cross_modal: Arc<dyn EmbeddingProvider>) -> Self {
        Self { text, cross_modal }
    }

    pub fn from_config(config: &EmbeddingsConfig) -> AppResult<Self> {
        Ok(Self {
            text: create_provider(&config.text)?,
            cross_modal: create_provider(&config.cross_modal)?,
        })
    }

    /// The provider whose vector space `modality`'s store is indexed in.
    pub fn for_modality(&self, modality: Modality) -> &Arc<dyn EmbeddingProvider> {
        match modality {
            Modality::Image => &self.cross_modal,
            Modality::Document | Modality::Audio | Modality::Text => &self.text,
        }
    }
}
