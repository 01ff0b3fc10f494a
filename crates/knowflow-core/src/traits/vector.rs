use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ScoredChunk, SearchFilter, VectorEntry};

/// Similarity search backend for embedded chunks
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    async fn add(&self, entries: Vec<VectorEntry>) -> Result<usize>;

    /// Top `k` chunks passing `filter`, sorted by descending score
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove every chunk of a document, returning how many were removed
    async fn delete_document(&self, doc_id: &str) -> Result<usize>;
}
