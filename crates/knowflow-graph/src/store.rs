//! Knowledge graph store: merge-by-id writes, generated queries and bounded traversal

use knowflow_core::{
    ContextNode, GraphDatabase, GraphKnowledge, GraphRecord, KnowflowError, LanguageModel, Result,
    StoreReport,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cypher::{self, clean_generated, QueryGate};
use crate::prompts::CYPHER_SYSTEM_PROMPT;

/// Service name attached to graph failures
pub const GRAPH_SERVICE: &str = "GraphService";

/// Hard ceiling on traversal depth
pub const MAX_TRAVERSAL_HOPS: usize = 5;

pub struct KnowledgeGraphStore {
    db: Arc<dyn GraphDatabase>,
    llm: Arc<dyn LanguageModel>,
    gate: QueryGate,
}

impl KnowledgeGraphStore {
    pub fn new(db: Arc<dyn GraphDatabase>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            db,
            llm,
            gate: QueryGate::default(),
        }
    }

    pub fn with_allowed_keywords(mut self, keywords: Vec<String>) -> Self {
        self.gate = QueryGate::new(keywords);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.db.name()
    }

    /// Persist extracted knowledge for `doc_id` in one transaction
    ///
    /// Re-storing the same knowledge leaves the graph unchanged.
    pub async fn store(&self, doc_id: &str, knowledge: &GraphKnowledge) -> Result<StoreReport> {
        if doc_id.trim().is_empty() {
            return Err(KnowflowError::validation("doc_id must not be empty"));
        }

        let mut knowledge = knowledge.clone();
        let dropped = knowledge.retain_resolved(&[doc_id]);
        if dropped > 0 {
            warn!(doc_id, dropped, "Dropping relationships with unknown endpoints");
        }

        let mut statements = Vec::with_capacity(1 + knowledge.nodes.len() + knowledge.relationships.len());
        statements.push(cypher::merge_document(doc_id));
        for node in &knowledge.nodes {
            statements.push(cypher::merge_node(doc_id, node)?);
        }
        for relationship in &knowledge.relationships {
            statements.push(cypher::merge_relationship(relationship)?);
        }

        self.db
            .run_in_transaction(statements)
            .await
            .map_err(|e| self.fail("store graph knowledge", e))?;

        let report = StoreReport {
            nodes: knowledge.nodes.len(),
            relationships: knowledge.relationships.len(),
        };
        info!(
            doc_id,
            nodes = report.nodes,
            relationships = report.relationships,
            "Stored graph knowledge"
        );
        Ok(report)
    }

    /// Translate a question into Cypher with the language model
    ///
    /// The result has passed the keyword gate.
    pub async fn generate_query(&self, natural_language: &str) -> Result<String> {
        let raw = self
            .llm
            .complete(CYPHER_SYSTEM_PROMPT, natural_language)
            .await
            .map_err(|e| self.fail("generate graph query", e))?;

        let query = clean_generated(&raw);
        if let Err(keyword) = self.gate.check(&query) {
            error!(keyword = %keyword, query = %query, "Generated graph query rejected");
            return Err(KnowflowError::external(
                GRAPH_SERVICE,
                format!("generated query starts with disallowed keyword '{keyword}'"),
            ));
        }
        debug!(query = %query, "Generated graph query");
        Ok(query)
    }

    /// Answer a natural-language question with records from the graph
    pub async fn query(&self, natural_language: &str) -> Result<Vec<GraphRecord>> {
        let query = self.generate_query(natural_language).await?;
        let records = self
            .db
            .run(knowflow_core::Statement::new(query))
            .await
            .map_err(|e| self.fail("run graph query", e))?;
        debug!(records = records.len(), "Graph query returned");
        Ok(records)
    }

    /// Breadth-first neighbourhood of `anchor_ids`
    ///
    /// `hops` is clamped to [`MAX_TRAVERSAL_HOPS`]. Anchors are never part of the result
    /// and no more than `max_nodes` nodes are returned.
    pub async fn expand(
        &self,
        anchor_ids: &[String],
        hops: usize,
        max_nodes: usize,
    ) -> Result<Vec<ContextNode>> {
        let hops = hops.min(MAX_TRAVERSAL_HOPS);
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: Vec<String> = anchor_ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .filter(|id| visited.insert(id.to_string()))
            .cloned()
            .collect();
        let mut found = Vec::new();

        for hop in 0..hops {
            if frontier.is_empty() || found.len() >= max_nodes {
                break;
            }
            let visited_ids: Vec<String> = visited.iter().cloned().collect();
            let statement = cypher::neighbours(&frontier, &visited_ids, max_nodes - found.len());
            let records = self
                .db
                .run(statement)
                .await
                .map_err(|e| self.fail("expand graph context", e))?;

            let mut next = Vec::new();
            for node in records.iter().filter_map(context_node) {
                if found.len() >= max_nodes {
                    break;
                }
                if visited.insert(node.id.clone()) {
                    next.push(node.id.clone());
                    found.push(node);
                }
            }
            debug!(hop = hop + 1, discovered = next.len(), "Expanded graph frontier");
            frontier = next;
        }

        Ok(found)
    }

    fn fail(&self, operation: &str, err: KnowflowError) -> KnowflowError {
        if !err.is_cancelled() {
            error!(backend = self.db.name(), operation, error = %err, "Graph operation failed");
        }
        err.tagged(GRAPH_SERVICE)
    }
}

fn context_node(record: &GraphRecord) -> Option<ContextNode> {
    let id = match record.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let label = record
        .get("labels")
        .and_then(Value::as_array)
        .and_then(|labels| labels.first())
        .and_then(Value::as_str)
        .map(str::to_string);
    let properties = record
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some(ContextNode {
        id,
        label,
        properties,
    })
}
