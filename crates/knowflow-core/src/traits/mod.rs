//! Collaborator abstractions (traits) for Knowflow's dependency inversion
//!
//! - Core defines the traits
//! - Adapters (HTTP models, Neo4j, SQLite, filesystem) depend on core for the definitions
//! - The pipeline orchestrates through `Arc<dyn Trait>` handles, never concrete types
//!
//! ## Architecture Pattern
//!
//! ```text
//! ┌──────────────────────┐
//! │  knowflow-pipeline   │  ← Orchestrator (consumes traits)
//! └─────────┬────────────┘
//!           │ uses (trait objects)
//!           ▼
//! ┌──────────────────────┐
//! │    knowflow-core     │  ← Defines LanguageModel, VectorStore, GraphDatabase, ...
//! └─────────┬────────────┘
//!           ▲ implements
//! ┌─────────┴────────────┐
//! │  llm / graph / sqlite│  ← Concrete adapters
//! └──────────────────────┘
//! ```

pub mod blob;
pub mod embedding;
pub mod graph;
pub mod llm;
pub mod store;
pub mod vector;

pub use blob::{BlobMetadata, BlobStorage};
pub use embedding::EmbeddingModel;
pub use graph::{GraphDatabase, Statement};
pub use llm::LanguageModel;
pub use store::{DocumentStore, SessionStore};
pub use vector::VectorStore;
