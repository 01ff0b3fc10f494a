//! # Knowflow Core
//!
//! Domain types, collaborator traits and the error taxonomy for Knowflow's hybrid
//! retrieval pipeline.
//!
//! The pipeline crate orchestrates through the traits defined here; the HTTP, Neo4j and
//! SQLite adapters implement them. Nothing in this crate performs I/O.
//!
//! - [`types`]: queries, evidence, knowledge graph arena, sessions, documents
//! - [`traits`]: `LanguageModel`, `EmbeddingModel`, `VectorStore`, `GraphDatabase`,
//!   `BlobStorage`, `SessionStore`, `DocumentStore`
//! - [`error`]: [`KnowflowError`] and the user-facing [`ErrorPayload`]
//! - [`llm_output`]: cleaning and repair of model completions

pub mod error;
pub mod llm_output;
pub mod traits;
pub mod types;
pub mod vector_math;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use error::{ErrorKind, ErrorPayload, KnowflowError, Result};

// Re-export core traits (abstractions for dependency inversion)
pub use traits::{
    BlobMetadata, BlobStorage, DocumentStore, EmbeddingModel, GraphDatabase, LanguageModel,
    SessionStore, Statement, VectorStore,
};

// Re-export key types used across crate boundaries
pub use types::{
    ContextNode, ContextUsed, ConversationSession, Document, DocumentChunk, DocumentQuery,
    DocumentStatus, EvaluationResult, EvidenceItem, EvidenceSource, GraphKnowledge, GraphRecord,
    KnowledgeNode, KnowledgeRelationship, Message, NewMessage, NodeLabel, QueryRequest,
    QueryResponse, RelationshipType, ScoredChunk, SearchFilter, Sender, SessionId, StoreReport,
    SubResponse, UserId, VectorEntry,
};
