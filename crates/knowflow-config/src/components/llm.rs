//! Language model configuration

use serde::{Deserialize, Serialize};

use super::defaults;

/// LLM provider type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// Ollama chat API (local or remote)
    #[default]
    Ollama,
    /// Any OpenAI-compatible `/chat/completions` endpoint
    OpenAI,
}

impl LlmProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }
}

/// Language model settings used for decomposition, evaluation, extraction and answers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderType,
    /// Model name (provider default if not set)
    pub model: Option<String>,
    /// Endpoint URL (provider default if not set)
    pub endpoint: Option<String>,
    /// API key; usually supplied through `KNOWFLOW_LLM_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// Get the LLM endpoint, using provider-specific default if not specified
    pub fn llm_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| match self.provider {
                LlmProviderType::Ollama => "http://localhost:11434".to_string(),
                LlmProviderType::OpenAI => "https://api.openai.com/v1".to_string(),
            })
    }

    pub fn chat_model(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider {
            LlmProviderType::Ollama => defaults::DEFAULT_CHAT_MODEL.to_string(),
            LlmProviderType::OpenAI => defaults::DEFAULT_OPENAI_CHAT_MODEL.to_string(),
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(defaults::DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(defaults::DEFAULT_CHAT_MAX_TOKENS)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(defaults::DEFAULT_TIMEOUT_SECS)
    }
}
