//! Property graph database contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::GraphRecord;

/// A parameterized graph query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "statement")]
    pub text: String,
    #[serde(rename = "parameters", default)]
    pub params: Map<String, Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Executes declarative queries against a property graph
#[async_trait]
pub trait GraphDatabase: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, statement: Statement) -> Result<Vec<GraphRecord>>;

    /// Run all statements as one unit of work; nothing is applied if any fails
    async fn run_in_transaction(&self, statements: Vec<Statement>) -> Result<()>;
}
