//! Embedding model implementations

pub mod ollama;
pub mod openai;

pub use ollama::OllamaEmbeddingModel;
pub use openai::OpenAIEmbeddingModel;

use knowflow_config::{EmbeddingConfig, EmbeddingProviderType};
use knowflow_core::{EmbeddingModel, KnowflowError, Result};
use std::sync::Arc;

/// Create an embedding model from configuration
pub fn create_embedding_model(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    match config.provider {
        EmbeddingProviderType::Ollama => Ok(Arc::new(
            OllamaEmbeddingModel::new(
                config.get_api_url().to_string(),
                config.get_model().to_string(),
                config.dimensions(),
                config.timeout_secs(),
            )
            .with_batch_size(config.batch_size),
        )),
        EmbeddingProviderType::OpenAI => {
            if config.api_key.is_none() && config.get_api_url().contains("api.openai.com") {
                return Err(KnowflowError::validation(
                    "KNOWFLOW_EMBEDDING_API_KEY not set for the OpenAI provider",
                ));
            }
            Ok(Arc::new(
                OpenAIEmbeddingModel::new(
                    config.api_key.clone(),
                    config.get_api_url().to_string(),
                    config.get_model().to_string(),
                    config.dimensions(),
                    config.timeout_secs(),
                )
                .with_batch_size(config.batch_size),
            ))
        }
    }
}

/// Every vector must have the configured length
pub(crate) fn check_dimensions(service: &str, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(KnowflowError::external(
            service,
            format!("expected {} dimensions, got {}", expected, bad.len()),
        )),
        None => Ok(()),
    }
}
