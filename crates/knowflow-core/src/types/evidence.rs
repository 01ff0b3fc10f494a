//! Retrieved evidence and vector-store records

use serde::{Deserialize, Serialize};

use super::query::UserId;

/// Which backend produced a piece of evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Vector,
    Graph,
}

/// A snippet of retrieved text
///
/// Vector evidence carries a similarity score; graph evidence does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub text: String,
    pub source: EvidenceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl EvidenceItem {
    pub fn vector(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            source: EvidenceSource::Vector,
            score: Some(score),
        }
    }

    pub fn graph(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: EvidenceSource::Graph,
            score: None,
        }
    }
}

/// Owner and document scope applied to every vector search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
}

impl SearchFilter {
    pub fn owner(owner_id: UserId) -> Self {
        Self {
            owner_id,
            document_ids: None,
        }
    }

    pub fn with_documents(mut self, document_ids: Option<Vec<String>>) -> Self {
        self.document_ids = document_ids;
        self
    }

    /// Whether a chunk with this owner and document id passes the filter
    pub fn matches(&self, owner_id: UserId, doc_id: &str) -> bool {
        if owner_id != self.owner_id {
            return false;
        }
        match &self.document_ids {
            Some(ids) => ids.iter().any(|id| id == doc_id),
            None => true,
        }
    }
}

/// Metadata stored alongside each embedded chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub owner_id: UserId,
    pub chunk_index: usize,
}

/// A chunk to be written to the vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A vector-store hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}
