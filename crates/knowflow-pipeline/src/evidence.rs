//! Vector evidence: embed the query, search the store, keep the text

use knowflow_core::{
    EmbeddingModel, EvidenceItem, KnowflowError, Result, ScoredChunk, SearchFilter, VectorStore,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Service name attached to vector retrieval failures
pub const VECTOR_SERVICE: &str = "VectorStore";

pub struct EvidenceStore {
    embedder: Arc<dyn EmbeddingModel>,
    vectors: Arc<dyn VectorStore>,
}

impl EvidenceStore {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, vectors: Arc<dyn VectorStore>) -> Self {
        Self { embedder, vectors }
    }

    /// Top `k` chunks for `query` within `filter`, best first
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<EvidenceItem>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| self.fail("embed query", e))?;
        let hits = self
            .vectors
            .search(&embedding, k, filter)
            .await
            .map_err(|e| self.fail("similarity search", e))?;
        debug!(hits = hits.len(), k, "Vector search complete");
        Ok(into_evidence(hits))
    }

    /// One refinement round: a single batch embedding, then one search per query
    ///
    /// Results are concatenated in query order.
    pub async fn search_many(
        &self,
        queries: &[String],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<EvidenceItem>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .embedder
            .embed_batch(queries)
            .await
            .map_err(|e| self.fail("embed reformulations", e))?;
        if embeddings.len() != queries.len() {
            return Err(self.fail(
                "embed reformulations",
                KnowflowError::external(
                    self.embedder.name(),
                    format!(
                        "expected {} embeddings, got {}",
                        queries.len(),
                        embeddings.len()
                    ),
                ),
            ));
        }

        let mut evidence = Vec::new();
        for embedding in &embeddings {
            let hits = self
                .vectors
                .search(embedding, k, filter)
                .await
                .map_err(|e| self.fail("similarity search", e))?;
            evidence.extend(into_evidence(hits));
        }
        debug!(queries = queries.len(), hits = evidence.len(), "Refinement search complete");
        Ok(evidence)
    }

    fn fail(&self, operation: &str, err: KnowflowError) -> KnowflowError {
        if !err.is_cancelled() {
            error!(backend = self.vectors.name(), operation, error = %err, "Vector retrieval failed");
        }
        err.tagged(VECTOR_SERVICE)
    }
}

fn into_evidence(mut hits: Vec<ScoredChunk>) -> Vec<EvidenceItem> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.into_iter()
        .map(|hit| EvidenceItem::vector(hit.text, hit.score))
        .collect()
}
