//! Knowledge graph model
//!
//! The graph is stored as an arena: nodes are unique by id and relationships are a flat
//! list that references node ids. Cycles and shared references are therefore just data,
//! never ownership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A row returned by a graph query: column name to value
pub type GraphRecord = serde_json::Map<String, serde_json::Value>;

/// Labels a node may carry after extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Document,
    Section,
    Entity,
    Concept,
    Tag,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 5] = [
        NodeLabel::Document,
        NodeLabel::Section,
        NodeLabel::Entity,
        NodeLabel::Concept,
        NodeLabel::Tag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Document => "Document",
            NodeLabel::Section => "Section",
            NodeLabel::Entity => "Entity",
            NodeLabel::Concept => "Concept",
            NodeLabel::Tag => "Tag",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeLabel {
    type Err = String;

    /// Exact match only; the model must use the schema spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("invalid node label: {s}"))
    }
}

/// Relationship types allowed between extracted nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Contains,
    RelatedTo,
    Mentions,
    HasTag,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 4] = [
        RelationshipType::Contains,
        RelationshipType::RelatedTo,
        RelationshipType::Mentions,
        RelationshipType::HasTag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::RelatedTo => "RELATED_TO",
            RelationshipType::Mentions => "MENTIONS",
            RelationshipType::HasTag => "HAS_TAG",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("invalid relationship type: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub label: NodeLabel,
    pub properties: NodeProperties,
}

impl KnowledgeNode {
    pub fn new(id: impl Into<String>, label: NodeLabel, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label,
            properties: NodeProperties {
                name: name.into(),
                content: None,
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.properties.content = Some(content.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub extracted_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRelationship {
    pub start_node: String,
    pub end_node: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    pub properties: RelationshipProperties,
}

impl KnowledgeRelationship {
    pub fn new(
        start_node: impl Into<String>,
        end_node: impl Into<String>,
        kind: RelationshipType,
    ) -> Self {
        Self {
            start_node: start_node.into(),
            end_node: end_node.into(),
            kind,
            properties: RelationshipProperties {
                context: None,
                extracted_at: Utc::now().to_rfc3339(),
            },
        }
    }
}

/// Result of graph extraction for one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphKnowledge {
    pub nodes: Vec<KnowledgeNode>,
    pub relationships: Vec<KnowledgeRelationship>,
}

impl GraphKnowledge {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    /// Insert a node unless one with the same id is already present
    ///
    /// Returns `false` when the node was a duplicate.
    pub fn push_node(&mut self, node: KnowledgeNode) -> bool {
        if self.node(&node.id).is_some() {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Insert a relationship if both endpoints exist and it is not a duplicate
    pub fn push_relationship(&mut self, relationship: KnowledgeRelationship) -> bool {
        if self.node(&relationship.start_node).is_none()
            || self.node(&relationship.end_node).is_none()
        {
            return false;
        }
        let duplicate = self.relationships.iter().any(|existing| {
            existing.start_node == relationship.start_node
                && existing.end_node == relationship.end_node
                && existing.kind == relationship.kind
        });
        if duplicate {
            return false;
        }
        self.relationships.push(relationship);
        true
    }

    /// Drop relationships whose endpoints are not in `extra_ids` or the node batch
    pub fn retain_resolved(&mut self, extra_ids: &[&str]) -> usize {
        let mut known = self.node_ids().into_iter().map(str::to_string).collect::<HashSet<_>>();
        known.extend(extra_ids.iter().map(|id| id.to_string()));

        let before = self.relationships.len();
        self.relationships
            .retain(|rel| known.contains(&rel.start_node) && known.contains(&rel.end_node));
        before - self.relationships.len()
    }
}

/// A node surfaced by follow-up traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Summary of a graph write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReport {
    pub nodes: usize,
    pub relationships: usize,
}

/// Timestamp format used for graph properties
pub fn graph_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}
