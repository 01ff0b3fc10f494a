//! Knowledge graph backend configuration

use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Neo4j HTTP endpoint, e.g. `http://localhost:7474`
    pub uri: Option<String>,
    pub user: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
    /// Node budget for follow-up traversal
    pub max_traversal_nodes: Option<usize>,
    /// Leading keywords a generated query may start with
    pub allowed_query_keywords: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

impl GraphConfig {
    pub fn uri(&self) -> &str {
        self.uri.as_deref().unwrap_or(defaults::DEFAULT_NEO4J_URI)
    }

    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(defaults::DEFAULT_NEO4J_USER)
    }

    pub fn database(&self) -> &str {
        self.database
            .as_deref()
            .unwrap_or(defaults::DEFAULT_NEO4J_DATABASE)
    }

    pub fn max_traversal_nodes(&self) -> usize {
        self.max_traversal_nodes
            .unwrap_or(defaults::DEFAULT_MAX_TRAVERSAL_NODES)
    }

    /// Allow-list in upper case
    pub fn allowed_query_keywords(&self) -> Vec<String> {
        match &self.allowed_query_keywords {
            Some(keywords) => keywords.iter().map(|k| k.trim().to_uppercase()).collect(),
            None => defaults::DEFAULT_ALLOWED_QUERY_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(defaults::DEFAULT_TIMEOUT_SECS)
    }
}
