//! OpenAI-compatible embeddings (`POST {base}/embeddings`)

use async_trait::async_trait;
use knowflow_core::{EmbeddingModel, KnowflowError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::check_dimensions;
use crate::http::{endpoint, post_json};

pub struct OpenAIEmbeddingModel {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    timeout: Duration,
}

impl OpenAIEmbeddingModel {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        model: String,
        dimensions: usize,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
            dimensions,
            batch_size: 16,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let url = endpoint(&self.base_url, "embeddings");

        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let mut response: EmbeddingResponse =
            post_json(request, &body, self.name(), self.timeout).await?;
        if response.data.len() != inputs.len() {
            return Err(KnowflowError::external(
                self.name(),
                format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    response.data.len()
                ),
            ));
        }

        // The API may return items out of order
        response.data.sort_by_key(|item| item.index);
        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        check_dimensions(self.name(), self.dimensions, &vectors)?;
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    fn name(&self) -> &str {
        "OpenAIEmbeddings"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| KnowflowError::external(self.name(), "empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "Embedding batch");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
