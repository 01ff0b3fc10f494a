//! Chat model implementations

pub mod ollama;
pub mod openai;

// Re-export models
pub use ollama::OllamaChatModel;
pub use openai::OpenAIChatModel;

use knowflow_config::{LlmConfig, LlmProviderType};
use knowflow_core::{KnowflowError, LanguageModel, Result};
use std::sync::Arc;

const OPENAI_API_HOST: &str = "api.openai.com";

/// Create a language model from configuration
///
/// The hosted OpenAI endpoint requires an API key; self-hosted compatible servers do not.
pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider {
        LlmProviderType::Ollama => {
            let model = OllamaChatModel::new(
                config.llm_endpoint(),
                config.chat_model(),
                config.timeout_secs(),
            )
            .with_temperature(config.temperature());
            Ok(Arc::new(model))
        }
        LlmProviderType::OpenAI => {
            let endpoint = config.llm_endpoint();
            if config.api_key.is_none() && endpoint.contains(OPENAI_API_HOST) {
                return Err(KnowflowError::validation(
                    "KNOWFLOW_LLM_API_KEY not set for the OpenAI provider",
                ));
            }

            let model = OpenAIChatModel::new(
                config.api_key.clone(),
                Some(endpoint),
                config.chat_model(),
                config.timeout_secs(),
            )
            .with_sampling(config.temperature(), config.max_tokens());
            Ok(Arc::new(model))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_factory_builds_ollama_by_default() {
        let model = assert_ok!(create_language_model(&LlmConfig::default()));
        assert_eq!(model.name(), "Ollama");
    }

    #[test]
    fn test_factory_requires_key_for_hosted_openai() {
        let config = LlmConfig {
            provider: LlmProviderType::OpenAI,
            ..Default::default()
        };
        let err = create_language_model(&config).err();
        assert!(matches!(err, Some(KnowflowError::Validation(_))));

        let local = LlmConfig {
            provider: LlmProviderType::OpenAI,
            endpoint: Some("http://localhost:8000/v1".to_string()),
            ..Default::default()
        };
        assert_ok!(create_language_model(&local));
    }
}
