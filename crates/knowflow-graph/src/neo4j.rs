//! Neo4j over the HTTP transactional endpoint
//!
//! `POST {uri}/db/{database}/tx/commit` runs a list of statements in one implicit
//! transaction. Neo4j reports statement failures in the body's `errors` array with a
//! 200 status, so both the status and the array are checked.

use async_trait::async_trait;
use knowflow_config::GraphConfig;
use knowflow_core::{GraphDatabase, GraphRecord, KnowflowError, Result, Statement};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct Neo4jHttpDatabase {
    client: reqwest::Client,
    uri: String,
    database: String,
    user: String,
    password: Option<String>,
    timeout: Duration,
}

impl Neo4jHttpDatabase {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            uri: uri.into(),
            database: database.into(),
            user: "neo4j".to_string(),
            password: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        let db = Self::new(config.uri(), config.database()).with_timeout(config.timeout_secs());
        match &config.password {
            Some(password) => db.with_auth(config.user(), password.clone()),
            None => db,
        }
    }

    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.uri.trim_end_matches('/'),
            self.database
        )
    }

    async fn commit(&self, statements: &[Statement]) -> Result<Vec<StatementResult>> {
        let body = serde_json::json!({ "statements": statements });
        let url = self.commit_url();
        debug!(url = %url, statements = statements.len(), "Committing Neo4j transaction");

        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/json;charset=UTF-8")
            .json(&body)
            .timeout(self.timeout);
        if let Some(password) = &self.password {
            request = request.basic_auth(&self.user, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                KnowflowError::Timeout {
                    service: self.name().to_string(),
                    after: self.timeout,
                }
            } else {
                KnowflowError::external(self.name(), format!("HTTP request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(KnowflowError::external(
                self.name(),
                format!("API error ({}): {}", status, error_text),
            ));
        }

        let parsed: CommitResponse = response.json().await.map_err(|e| {
            KnowflowError::external(self.name(), format!("Failed to parse response: {}", e))
        })?;

        if let Some(first) = parsed.errors.first() {
            return Err(KnowflowError::external(
                self.name(),
                format!("{}: {}", first.code, first.message),
            ));
        }
        Ok(parsed.results)
    }
}

#[async_trait]
impl GraphDatabase for Neo4jHttpDatabase {
    fn name(&self) -> &str {
        "Neo4j"
    }

    async fn run(&self, statement: Statement) -> Result<Vec<GraphRecord>> {
        let results = self.commit(std::slice::from_ref(&statement)).await?;
        Ok(results
            .into_iter()
            .next()
            .map(StatementResult::into_records)
            .unwrap_or_default())
    }

    async fn run_in_transaction(&self, statements: Vec<Statement>) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.commit(&statements).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

impl StatementResult {
    /// Zip each row with the column names
    fn into_records(self) -> Vec<GraphRecord> {
        let columns = self.columns;
        self.data
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row.row).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_url() {
        let db = Neo4jHttpDatabase::new("http://localhost:7474/", "neo4j");
        assert_eq!(db.commit_url(), "http://localhost:7474/db/neo4j/tx/commit");
    }

    #[test]
    fn test_rows_become_column_maps() {
        let result: StatementResult = serde_json::from_value(serde_json::json!({
            "columns": ["id", "name"],
            "data": [{"row": ["a", "Acme"], "meta": [null, null]}]
        }))
        .unwrap();
        let records = result.into_records();
        assert_eq!(records[0]["id"], "a");
        assert_eq!(records[0]["name"], "Acme");
    }

    #[test]
    fn test_from_config_uses_defaults() {
        let db = Neo4jHttpDatabase::from_config(&GraphConfig::default());
        assert_eq!(db.commit_url(), "http://localhost:7474/db/neo4j/tx/commit");
        assert!(db.password.is_none());
    }
}
