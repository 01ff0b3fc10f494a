//! Retrieval Orchestration Layer
//!
//! This crate coordinates Knowflow's hybrid retrieval pipeline on top of the collaborator
//! traits in `knowflow-core`.
//!
//! ## Architecture
//!
//! A query moves through four phases:
//! 1. **Decompose**: split a multi-part question into at most three sub-questions
//! 2. **Retrieve**: vector search and graph query run concurrently per sub-question
//! 3. **Refine**: score the vector evidence and re-retrieve with alternative terms,
//!    for at most two rounds
//! 4. **Answer**: fuse evidence into one context, answer each sub-question and
//!    synthesize a single response
//!
//! Follow-up turns skip retrieval and answer from a bounded graph neighbourhood of the
//! nodes the conversation has touched. Ingestion is the write side: upload, graph
//! extraction, chunking and embedding.
//!
//! Infrastructure crates (DO NOT orchestrate):
//! - `knowflow-llm`: chat completions and embeddings over HTTP
//! - `knowflow-graph`: extraction, graph writes and traversal
//! - `knowflow-sqlite`: sessions, messages, documents and vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use knowflow_pipeline::{ConversationManager, FollowUpRequest};
//!
//! let session = manager.create_session(owner, None).await?;
//! let request = QueryRequest::new("What is the refund policy?", owner).with_session(session.id);
//! let answer = manager.chat(&request).await?;
//!
//! let follow_up = manager
//!     .follow_up(owner, session.id, FollowUpRequest::new("And for digital goods?"))
//!     .await?;
//! ```

pub mod blob;
pub mod conversation;
pub mod decomposer;
pub mod evaluator;
pub mod evidence;
pub mod fusion;
pub mod guard;
pub mod ingest;
pub mod keyed_lock;
pub mod orchestrator;
pub mod prompts;

pub use blob::FsBlobStorage;
pub use conversation::{ConversationConfig, ConversationManager, FollowUpRequest, FollowUpResponse};
pub use decomposer::QueryDecomposer;
pub use evaluator::RetrievalQualityEvaluator;
pub use evidence::EvidenceStore;
pub use guard::CallGuard;
pub use ingest::{ContentKind, DocumentIngestor, IndexReport, IngestorConfig, TextChunker};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use orchestrator::{OrchestratorConfig, RetrievalOrchestrator, MAX_REFINEMENT_ROUNDS};
