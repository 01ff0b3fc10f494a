//! # Knowflow Graph
//!
//! Knowledge graph side of the retrieval pipeline:
//!
//! - [`GraphExtractor`]: text to validated nodes and relationships via a language model
//! - [`KnowledgeGraphStore`]: merge-by-id writes, LLM-generated Cypher behind a keyword
//!   gate, bounded neighbourhood traversal for follow-ups
//! - [`Neo4jHttpDatabase`]: [`knowflow_core::GraphDatabase`] over Neo4j's HTTP API
//! - `MemoryGraphDatabase` (feature `test-utils`): in-memory backend for tests

pub mod cypher;
pub mod extractor;
pub mod neo4j;
pub mod prompts;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use cypher::QueryGate;
pub use extractor::{parse_extraction, GraphExtractor};
pub use neo4j::Neo4jHttpDatabase;
pub use store::{KnowledgeGraphStore, GRAPH_SERVICE, MAX_TRAVERSAL_HOPS};

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryGraphDatabase;
