//! LLM-driven knowledge graph extraction
//!
//! Extraction fails open: a model error, unparseable output or a wrong top-level shape
//! all yield an empty [`GraphKnowledge`], and individual malformed items are dropped
//! rather than failing the batch.

use chrono::{DateTime, Utc};
use knowflow_core::llm_output::{clean_response, parse_lenient};
use knowflow_core::types::{graph_timestamp, NodeProperties, RelationshipProperties};
use knowflow_core::{
    GraphKnowledge, KnowledgeNode, KnowledgeRelationship, LanguageModel,
    NodeLabel, RelationshipType, Result,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompts::{extraction_user_prompt, EXTRACTION_SYSTEM_PROMPT};

pub struct GraphExtractor {
    llm: Arc<dyn LanguageModel>,
}

impl GraphExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Extract a validated graph from `text`
    ///
    /// Only cancellation is reported as an error; every other failure is an empty graph.
    pub async fn extract(&self, text: &str) -> Result<GraphKnowledge> {
        if text.trim().is_empty() {
            return Ok(GraphKnowledge::empty());
        }

        let raw = match self
            .llm
            .complete(EXTRACTION_SYSTEM_PROMPT, &extraction_user_prompt(text))
            .await
        {
            Ok(raw) => raw,
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                warn!(model = self.llm.name(), error = %err, "Graph extraction call failed");
                return Ok(GraphKnowledge::empty());
            }
        };

        let knowledge = parse_extraction(&raw, Utc::now());
        info!(
            nodes = knowledge.nodes.len(),
            relationships = knowledge.relationships.len(),
            "Extracted graph knowledge"
        );
        Ok(knowledge)
    }
}

/// Turn a raw completion into validated graph knowledge
///
/// `at` stamps any node or relationship that arrives without a timestamp.
pub fn parse_extraction(raw: &str, at: DateTime<Utc>) -> GraphKnowledge {
    let cleaned = clean_response(raw);
    let value = match parse_lenient(&cleaned) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Extraction output is not JSON, returning empty graph");
            debug!(output = %cleaned, "Unparseable extraction output");
            return GraphKnowledge::empty();
        }
    };

    let Some(object) = value.as_object() else {
        warn!("Extraction output is not a JSON object, returning empty graph");
        return GraphKnowledge::empty();
    };

    let stamp = graph_timestamp(at);
    let mut knowledge = GraphKnowledge::empty();
    let mut dropped_nodes = 0usize;
    let mut dropped_relationships = 0usize;

    for item in items(object, "nodes") {
        match parse_node(item, &stamp) {
            Ok(node) => {
                if !knowledge.push_node(node) {
                    dropped_nodes += 1;
                }
            }
            Err(reason) => {
                warn!(reason = %reason, "Dropping invalid node");
                dropped_nodes += 1;
            }
        }
    }

    for item in items(object, "relationships") {
        match parse_relationship(item, &stamp) {
            Ok(relationship) => {
                if !knowledge.push_relationship(relationship) {
                    debug!("Dropping dangling or duplicate relationship");
                    dropped_relationships += 1;
                }
            }
            Err(reason) => {
                warn!(reason = %reason, "Dropping invalid relationship");
                dropped_relationships += 1;
            }
        }
    }

    if dropped_nodes > 0 || dropped_relationships > 0 {
        warn!(
            dropped_nodes,
            dropped_relationships, "Extraction output contained unusable items"
        );
    }
    knowledge
}

fn items<'a>(object: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Ids are occasionally emitted as numbers
fn id_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_node(item: &Value, stamp: &str) -> std::result::Result<KnowledgeNode, String> {
    let object = item.as_object().ok_or("node is not an object")?;
    let id = id_field(object, "id").ok_or("node has no id")?;
    let label: NodeLabel = object
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("node {id} has no label"))?
        .parse()?;

    let empty = Map::new();
    let properties = object
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let name = string_field(properties, "name").ok_or_else(|| format!("node {id} has no name"))?;

    Ok(KnowledgeNode {
        id,
        label,
        properties: NodeProperties {
            name,
            content: string_field(properties, "content"),
            created_at: string_field(properties, "created_at").unwrap_or_else(|| stamp.to_string()),
        },
    })
}

fn parse_relationship(
    item: &Value,
    stamp: &str,
) -> std::result::Result<KnowledgeRelationship, String> {
    let object = item.as_object().ok_or("relationship is not an object")?;
    let start_node = id_field(object, "start_node").ok_or("relationship has no start_node")?;
    let end_node = id_field(object, "end_node").ok_or("relationship has no end_node")?;
    let kind: RelationshipType = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or("relationship has no type")?
        .parse()?;

    let empty = Map::new();
    let properties = object
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    Ok(KnowledgeRelationship {
        start_node,
        end_node,
        kind,
        properties: RelationshipProperties {
            context: string_field(properties, "context"),
            extracted_at: string_field(properties, "extracted_at")
                .unwrap_or_else(|| stamp.to_string()),
        },
    })
}
