use serde::{Deserialize, Serialize};

use super::defaults;

/// Document ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionConfig {
    /// Maximum characters per chunk
    pub chunk_size: Option<usize>,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: Option<usize>,
    /// Run graph extraction during indexing
    #[serde(default = "default_true")]
    pub extract_graph: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            chunk_overlap: None,
            extract_graph: true,
        }
    }
}

impl IngestionConfig {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(defaults::DEFAULT_CHUNK_SIZE)
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap.unwrap_or(defaults::DEFAULT_CHUNK_OVERLAP)
    }
}
