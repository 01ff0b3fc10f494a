//! OpenAI-compatible chat model

use async_trait::async_trait;
use knowflow_core::{KnowflowError, LanguageModel, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http::{endpoint, post_json};

/// Chat model speaking the OpenAI `/chat/completions` protocol
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIChatModel {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        model: String,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
            temperature: 0.2,
            max_tokens: 2048,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_request = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let url = endpoint(&self.base_url, "chat/completions");
        debug!(model = %self.model, url = %url, "Sending chat completion");

        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response: OpenAIResponse =
            post_json(request, &api_request, self.name(), self.timeout).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| KnowflowError::external(self.name(), "No choices in response"))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

// OpenAI API response types
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_model_creation() {
        let model = OpenAIChatModel::new(
            Some("sk-test-key".to_string()),
            None,
            "gpt-4o-mini".to_string(),
            60,
        );

        assert_eq!(model.name(), "OpenAI");
        assert_eq!(model.model(), "gpt-4o-mini");
        assert_eq!(model.base_url, "https://api.openai.com/v1");
    }
}
