//! Configuration components for Knowflow
//!
//! One focused struct per concern, each resolving its own defaults.

pub mod defaults;
pub mod embedding;
pub mod graph;
pub mod ingestion;
pub mod llm;
pub mod logging;
pub mod retrieval;
pub mod storage;

pub use embedding::*;
pub use graph::*;
pub use ingestion::*;
pub use llm::*;
pub use logging::*;
pub use retrieval::*;
pub use storage::*;
