//! Simple embedding configuration with sensible defaults

use serde::{Deserialize, Serialize};

use super::defaults;

/// Embedding provider type - enum for TOML serialization
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// Ollama `/api/embed`
    #[default]
    Ollama,
    /// OpenAI-compatible `/embeddings`
    OpenAI,
}

impl EmbeddingProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderType,
    /// Model name (defaults to provider-appropriate model)
    pub model: Option<String>,
    pub api_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Vector length; must match the model
    pub dimensions: Option<usize>,
    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub timeout_secs: Option<u64>,
}

fn default_batch_size() -> usize {
    defaults::DEFAULT_EMBEDDING_BATCH_SIZE
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            model: None,
            api_url: None,
            api_key: None,
            dimensions: None,
            batch_size: default_batch_size(),
            timeout_secs: None,
        }
    }
}

impl EmbeddingConfig {
    /// Get the actual model name to use
    pub fn get_model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.provider {
            EmbeddingProviderType::Ollama => "nomic-embed-text",
            EmbeddingProviderType::OpenAI => "text-embedding-3-small",
        })
    }

    pub fn get_api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(match self.provider {
            EmbeddingProviderType::Ollama => "http://localhost:11434",
            EmbeddingProviderType::OpenAI => "https://api.openai.com/v1",
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions.unwrap_or(match self.get_model() {
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        })
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(defaults::DEFAULT_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dimensions_follow_model() {
        let openai = EmbeddingConfig {
            provider: EmbeddingProviderType::OpenAI,
            ..Default::default()
        };
        assert_eq!(openai.get_model(), "text-embedding-3-small");
        assert_eq!(openai.dimensions(), 1536);

        let ollama = EmbeddingConfig::default();
        assert_eq!(ollama.get_model(), "nomic-embed-text");
        assert_eq!(ollama.dimensions(), 768);
    }

    #[test]
    fn test_explicit_dimensions_win() {
        let config: EmbeddingConfig = toml::from_str("dimensions = 256").unwrap();
        assert_eq!(config.dimensions(), 256);
        assert_eq!(config.batch_size, defaults::DEFAULT_EMBEDDING_BATCH_SIZE);
    }
}
