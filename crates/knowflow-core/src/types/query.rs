//! Query request and response shapes

use serde::{Deserialize, Serialize};

use super::evidence::EvidenceItem;
use super::graph::GraphRecord;
use crate::error::{KnowflowError, Result};

/// Identity of the user issuing a request
pub type UserId = i64;

/// Identifier of a conversation session
pub type SessionId = i64;

fn default_true() -> bool {
    true
}

/// A user query as accepted by the retrieval pipeline
///
/// Immutable once accepted: the orchestrator only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub use_decomposition: bool,
    #[serde(default = "default_true")]
    pub use_evaluation: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            query: query.into(),
            owner_id,
            session_id: None,
            document_ids: None,
            use_decomposition: true,
            use_evaluation: true,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_documents(mut self, document_ids: Vec<String>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    pub fn with_decomposition(mut self, enabled: bool) -> Self {
        self.use_decomposition = enabled;
        self
    }

    pub fn with_evaluation(mut self, enabled: bool) -> Self {
        self.use_evaluation = enabled;
        self
    }

    /// Reject blank queries and empty document scopes
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(KnowflowError::validation("query must not be empty"));
        }
        if let Some(ids) = &self.document_ids {
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(KnowflowError::validation("document ids must not be blank"));
            }
        }
        Ok(())
    }
}

/// Evidence and sub-answers that produced a response
///
/// Serialized untagged so the stored `context_used` record is either
/// `{vector_results, graph_results}` or `{sub_responses, synthesized_response}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextUsed {
    Synthesized {
        sub_responses: Vec<SubResponse>,
        synthesized_response: String,
    },
    Single {
        vector_results: Vec<EvidenceItem>,
        graph_results: Vec<GraphRecord>,
    },
}

impl ContextUsed {
    pub fn vector_results(&self) -> &[EvidenceItem] {
        match self {
            ContextUsed::Single { vector_results, .. } => vector_results,
            ContextUsed::Synthesized { .. } => &[],
        }
    }

    pub fn graph_results(&self) -> &[GraphRecord] {
        match self {
            ContextUsed::Single { graph_results, .. } => graph_results,
            ContextUsed::Synthesized { .. } => &[],
        }
    }

    pub fn sub_responses(&self) -> &[SubResponse] {
        match self {
            ContextUsed::Synthesized { sub_responses, .. } => sub_responses,
            ContextUsed::Single { .. } => &[],
        }
    }
}

/// Answer for one decomposed sub-question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResponse {
    pub question: String,
    pub message: String,
    pub context_used: ContextUsed,
}

/// Final pipeline output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub message: String,
    pub context_used: ContextUsed,
}
