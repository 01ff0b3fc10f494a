//! Core domain types for Knowflow
//!
//! Pure data structures shared by the pipeline and its adapters, organized by concern:
//! - Query types: `query` (QueryRequest, QueryResponse, ContextUsed)
//! - Evidence types: `evidence` (EvidenceItem, SearchFilter, ScoredChunk)
//! - Graph types: `graph` (KnowledgeNode, KnowledgeRelationship, GraphKnowledge)
//! - Evaluation types: `evaluation` (EvaluationResult)
//! - Session types: `session` (ConversationSession, Message)
//! - Document types: `document` (Document, DocumentChunk)

pub mod document;
pub mod evaluation;
pub mod evidence;
pub mod graph;
pub mod query;
pub mod session;

pub use document::{new_document_id, Document, DocumentChunk, DocumentQuery, DocumentStatus};
pub use evaluation::{ChunkScore, EvaluationResult, QUALITY_THRESHOLD};
pub use evidence::{
    ChunkMetadata, EvidenceItem, EvidenceSource, ScoredChunk, SearchFilter, VectorEntry,
};
pub use graph::{
    graph_timestamp, ContextNode, GraphKnowledge, GraphRecord, KnowledgeNode,
    KnowledgeRelationship, NodeLabel, NodeProperties, RelationshipProperties, RelationshipType,
    StoreReport,
};
pub use query::{ContextUsed, QueryRequest, QueryResponse, SessionId, SubResponse, UserId};
pub use session::{
    default_session_title, merge_recent_node_ids, ConversationSession, Message, NewMessage,
    Sender, RECENT_NODE_LIMIT,
};
