//! Test doubles for Knowflow collaborators
//!
//! Available to this crate's tests and, behind the `test-utils` feature, to downstream
//! crates' test suites.

pub mod mocks;

pub use mocks::{
    MemoryBlobStorage, MemoryDocumentStore, MemorySessionStore, MemoryVectorStore,
    MockEmbeddingModel, MockLanguageModel,
};
