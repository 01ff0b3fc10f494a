//! Top-level configuration and validation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::components::{
    EmbeddingConfig, GraphConfig, IngestionConfig, LlmConfig, LoggingConfig, RetrievalConfig,
    StorageConfig,
};

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Complete Knowflow configuration
///
/// Every section is optional in TOML; missing values resolve through the component
/// accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowflowConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl KnowflowConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k() == 0 {
            return Err(ConfigError::invalid("retrieval.top_k", "must be at least 1"));
        }
        if self.retrieval.call_timeout_secs() == 0 {
            return Err(ConfigError::invalid(
                "retrieval.call_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.graph.max_traversal_nodes() == 0 {
            return Err(ConfigError::invalid(
                "graph.max_traversal_nodes",
                "must be at least 1",
            ));
        }
        if self.graph.allowed_query_keywords().is_empty() {
            return Err(ConfigError::invalid(
                "graph.allowed_query_keywords",
                "must name at least one keyword",
            ));
        }
        if self.ingestion.chunk_size() == 0 {
            return Err(ConfigError::invalid("ingestion.chunk_size", "must be at least 1"));
        }
        if self.ingestion.chunk_overlap() >= self.ingestion.chunk_size() {
            return Err(ConfigError::invalid(
                "ingestion.chunk_overlap",
                "must be smaller than chunk_size",
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::invalid("embedding.batch_size", "must be at least 1"));
        }
        for (field, url) in [
            ("llm.endpoint", self.llm.llm_endpoint()),
            ("embedding.api_url", self.embedding.get_api_url().to_string()),
            ("graph.uri", self.graph.uri().to_string()),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid(field, format!("not an http(s) URL: {url}")));
            }
        }

        // Accept plain levels; full filter directives are validated by the subscriber
        let level = self.logging.level();
        if !level.contains('=') && !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{level}'"),
            ));
        }
        Ok(())
    }
}
