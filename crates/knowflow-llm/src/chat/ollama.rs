//! Ollama chat model

use async_trait::async_trait;
use knowflow_core::{LanguageModel, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http::{endpoint, post_json};

/// Chat model backed by Ollama's `/api/chat`
pub struct OllamaChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaChatModel {
    pub fn new(base_url: String, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            temperature: 0.2,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OllamaChatModel {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_request = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "stream": false,
            "options": {"temperature": self.temperature},
        });

        let url = endpoint(&self.base_url, "api/chat");
        debug!(model = %self.model, url = %url, "Sending Ollama chat request");

        let response: OllamaChatResponse = post_json(
            self.client.post(&url),
            &api_request,
            self.name(),
            self.timeout,
        )
        .await?;

        Ok(response.message.content)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_model_creation() {
        let model = OllamaChatModel::new(
            "http://localhost:11434".to_string(),
            "llama3.2".to_string(),
            60,
        );
        assert_eq!(model.name(), "Ollama");
        assert_eq!(model.model(), "llama3.2");
    }
}
