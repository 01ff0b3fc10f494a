//! In-memory [`GraphDatabase`] for tests
//!
//! Understands the statements built in [`crate::cypher`] (merges and neighbour hops) and
//! answers every other statement with a configurable canned result.

use async_trait::async_trait;
use knowflow_core::{GraphDatabase, GraphRecord, KnowflowError, Result, Statement};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

static MERGE_NODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^MERGE \(\w+(?::`(\w+)`)? \{id: \$(\w+)\}\)").unwrap());
static SET_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SET \w+:`(\w+)`").unwrap());
static MERGE_RELATIONSHIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"MERGE \(a\)-\[r:`(\w+)`\]->\(b\)").unwrap());

const NEIGHBOURS_PREFIX: &str = "MATCH (start)--(related)";

#[derive(Debug, Clone)]
struct StoredNode {
    /// In the order they were applied
    labels: Vec<String>,
    properties: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct StoredRelationship {
    start: String,
    end: String,
    kind: String,
    properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct Graph {
    nodes: BTreeMap<String, StoredNode>,
    relationships: Vec<StoredRelationship>,
}

#[derive(Debug, Default)]
struct State {
    graph: Graph,
    executed: Vec<Statement>,
    transactions: usize,
    query_result: Vec<GraphRecord>,
    fail_with: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryGraphDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryGraphDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().graph.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.lock().graph.relationships.len()
    }

    /// Stored properties of a node, including `id`
    pub fn node(&self, id: &str) -> Option<Map<String, Value>> {
        self.state
            .lock()
            .graph
            .nodes
            .get(id)
            .map(|node| node.properties.clone())
    }

    /// First label applied to a node
    pub fn label_of(&self, id: &str) -> Option<String> {
        self.labels_of(id).into_iter().next()
    }

    pub fn labels_of(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .graph
            .nodes
            .get(id)
            .map(|n| n.labels.clone())
            .unwrap_or_default()
    }

    /// Committed transactions
    pub fn transactions(&self) -> usize {
        self.state.lock().transactions
    }

    /// Every statement received, in order
    pub fn executed(&self) -> Vec<Statement> {
        self.state.lock().executed.clone()
    }

    /// Records returned for statements this double does not interpret
    pub fn set_query_result(&self, records: Vec<GraphRecord>) {
        self.state.lock().query_result = records;
    }

    pub fn set_fail_with(&self, message: Option<String>) {
        self.state.lock().fail_with = message;
    }
}

fn string_param(statement: &Statement, key: &str) -> Result<String> {
    statement
        .params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| KnowflowError::external("memory-graph", format!("missing parameter ${key}")))
}

fn object_param(statement: &Statement, key: &str) -> Map<String, Value> {
    statement
        .params
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn string_list_param(statement: &Statement, key: &str) -> Vec<String> {
    statement
        .params
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Graph {
    fn apply(&mut self, statement: &Statement, canned: &[GraphRecord]) -> Result<Vec<GraphRecord>> {
        if let Some(caps) = MERGE_RELATIONSHIP_RE.captures(&statement.text) {
            let start = string_param(statement, "start_id")?;
            let end = string_param(statement, "end_id")?;
            // MATCH finds nothing, so MERGE is a no-op
            if !self.nodes.contains_key(&start) || !self.nodes.contains_key(&end) {
                return Ok(Vec::new());
            }
            let kind = caps[1].to_string();
            let properties = object_param(statement, "properties");
            match self
                .relationships
                .iter_mut()
                .find(|r| r.start == start && r.end == end && r.kind == kind)
            {
                Some(existing) => existing.properties.extend(properties),
                None => self.relationships.push(StoredRelationship {
                    start,
                    end,
                    kind,
                    properties,
                }),
            }
            return Ok(Vec::new());
        }

        if let Some(caps) = MERGE_NODE_RE.captures(&statement.text) {
            let id = string_param(statement, &caps[2])?;
            let node = self.nodes.entry(id.clone()).or_insert_with(|| StoredNode {
                labels: Vec::new(),
                properties: Map::from_iter([("id".to_string(), Value::from(id))]),
            });
            let labels = caps
                .get(1)
                .into_iter()
                .chain(SET_LABEL_RE.captures(&statement.text).and_then(|c| c.get(1)));
            for label in labels {
                if !node.labels.iter().any(|l| l == label.as_str()) {
                    node.labels.push(label.as_str().to_string());
                }
            }
            node.properties.extend(object_param(statement, "properties"));
            if statement.text.contains("n.doc_id = $doc_id") {
                if let Some(doc_id) = statement.params.get("doc_id") {
                    node.properties.insert("doc_id".to_string(), doc_id.clone());
                }
            }
            return Ok(Vec::new());
        }

        if statement.text.starts_with(NEIGHBOURS_PREFIX) {
            return Ok(self.neighbours(statement));
        }

        Ok(canned.to_vec())
    }

    fn neighbours(&self, statement: &Statement) -> Vec<GraphRecord> {
        let frontier: HashSet<String> = string_list_param(statement, "frontier").into_iter().collect();
        let visited: HashSet<String> = string_list_param(statement, "visited").into_iter().collect();
        let limit = statement
            .params
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(usize::MAX);

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for rel in &self.relationships {
            let other = if frontier.contains(&rel.start) {
                &rel.end
            } else if frontier.contains(&rel.end) {
                &rel.start
            } else {
                continue;
            };
            if visited.contains(other) || !seen.insert(other.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(other) {
                let mut record = GraphRecord::new();
                record.insert("id".to_string(), Value::from(other.as_str()));
                record.insert("labels".to_string(), Value::from(node.labels.clone()));
                record.insert("properties".to_string(), Value::Object(node.properties.clone()));
                records.push(record);
            }
            if records.len() >= limit {
                break;
            }
        }
        records
    }
}

#[async_trait]
impl GraphDatabase for MemoryGraphDatabase {
    fn name(&self) -> &str {
        "memory-graph"
    }

    async fn run(&self, statement: Statement) -> Result<Vec<GraphRecord>> {
        let mut state = self.state.lock();
        state.executed.push(statement.clone());
        if let Some(message) = state.fail_with.clone() {
            return Err(KnowflowError::external("memory-graph", message));
        }
        let canned = state.query_result.clone();
        state.graph.apply(&statement, &canned)
    }

    async fn run_in_transaction(&self, statements: Vec<Statement>) -> Result<()> {
        let mut state = self.state.lock();
        state.executed.extend(statements.iter().cloned());
        if let Some(message) = state.fail_with.clone() {
            return Err(KnowflowError::external("memory-graph", message));
        }

        // Apply to a copy so a failing statement leaves nothing behind
        let mut graph = state.graph.clone();
        for statement in &statements {
            graph.apply(statement, &[])?;
        }
        state.graph = graph;
        state.transactions += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_transaction_leaves_graph_untouched() {
        let db = MemoryGraphDatabase::new();
        let statements = vec![
            Statement::new("MERGE (d:`Document` {id: $doc_id})").param("doc_id", "d1"),
            Statement::new("MERGE (n {id: $id}) SET n:`Entity`, n += $properties, n.doc_id = $doc_id"),
        ];

        assert!(db.run_in_transaction(statements).await.is_err());
        assert_eq!(db.node_count(), 0);
        assert_eq!(db.transactions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_statements_get_canned_records() {
        let db = MemoryGraphDatabase::new();
        let mut record = GraphRecord::new();
        record.insert("n".to_string(), Value::from(1));
        db.set_query_result(vec![record.clone()]);

        let rows = db.run(Statement::new("MATCH (n) RETURN n")).await.unwrap();
        assert_eq!(rows, vec![record]);
        assert_eq!(db.label_of("n"), None);
    }
}
