//! Cypher statements issued by the graph store, and the gate for generated queries
//!
//! Labels and relationship types are interpolated into statement text because Cypher
//! cannot parameterize them. They only ever come from [`NodeLabel`] and
//! [`RelationshipType`], never from model output. Everything else is a `$parameter`.

use knowflow_core::llm_output::clean_response;
use knowflow_core::{KnowledgeNode, KnowledgeRelationship, NodeLabel, Result, Statement};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Leading keywords a generated query may start with
pub const DEFAULT_ALLOWED_KEYWORDS: [&str; 8] = [
    "MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "RETURN", "CREATE", "MERGE",
];

static FIRST_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([A-Za-z]+)\b").unwrap());
static CYPHER_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(cypher|query)\s*:?\s+").unwrap());
// `//` only opens a comment at line start or after whitespace, so `'http://...'` survives
static LINE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)(^|[ \t])//[^\n]*").unwrap());
static BLOCK_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// `MERGE` the document anchor node
pub fn merge_document(doc_id: &str) -> Statement {
    Statement::new(format!(
        "MERGE (d:`{}` {{id: $doc_id}})",
        NodeLabel::Document.as_str()
    ))
    .param("doc_id", doc_id)
}

/// `MERGE` a node by id alone, then label it, overwrite its properties and tag it with
/// the document
///
/// An id re-extracted under another label gains that label instead of becoming a second node.
pub fn merge_node(doc_id: &str, node: &KnowledgeNode) -> Result<Statement> {
    let properties = serde_json::to_value(&node.properties)?;
    Ok(Statement::new(format!(
        "MERGE (n {{id: $id}}) SET n:`{}`, n += $properties, n.doc_id = $doc_id",
        node.label.as_str()
    ))
    .param("id", node.id.as_str())
    .param("properties", properties)
    .param("doc_id", doc_id))
}

/// `MERGE` a relationship between two existing nodes
pub fn merge_relationship(relationship: &KnowledgeRelationship) -> Result<Statement> {
    let properties = serde_json::to_value(&relationship.properties)?;
    Ok(Statement::new(format!(
        "MATCH (a {{id: $start_id}}) MATCH (b {{id: $end_id}}) MERGE (a)-[r:`{}`]->(b) SET r += $properties",
        relationship.kind.as_str()
    ))
    .param("start_id", relationship.start_node.as_str())
    .param("end_id", relationship.end_node.as_str())
    .param("properties", properties))
}

/// One traversal hop: distinct neighbours of `frontier` not yet in `visited`
pub fn neighbours(frontier: &[String], visited: &[String], limit: usize) -> Statement {
    Statement::new(
        "MATCH (start)--(related) \
         WHERE start.id IN $frontier AND NOT related.id IN $visited \
         RETURN DISTINCT related.id AS id, labels(related) AS labels, properties(related) AS properties \
         LIMIT $limit",
    )
    .param("frontier", Value::from(frontier.to_vec()))
    .param("visited", Value::from(visited.to_vec()))
    .param("limit", limit as u64)
}

/// Allow-list check on the first keyword of a generated query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGate {
    allowed: Vec<String>,
}

impl Default for QueryGate {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_KEYWORDS.iter().map(|k| k.to_string()))
    }
}

impl QueryGate {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|k| k.trim().to_uppercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Upper-cased first keyword, if the text starts with one
    pub fn first_keyword(query: &str) -> Option<String> {
        FIRST_KEYWORD_RE
            .captures(query)
            .map(|caps| caps[1].to_uppercase())
    }

    /// `Err` carries the offending keyword (or the empty string)
    pub fn check(&self, query: &str) -> std::result::Result<(), String> {
        match Self::first_keyword(query) {
            Some(keyword) if self.allowed.iter().any(|k| *k == keyword) => Ok(()),
            Some(keyword) => Err(keyword),
            None => Err(String::new()),
        }
    }
}

/// Tidy a cleaned completion into a single executable statement
///
/// Drops a leading `cypher:` tag left behind once fences are removed, and trailing
/// semicolons the transactional endpoint rejects.
pub fn normalize_generated(query: &str) -> String {
    let query = CYPHER_PREFIX_RE.replace(query, "");
    query.trim().trim_end_matches(';').trim_end().to_string()
}

/// Raw completion to executable statement
///
/// Cypher comments are dropped while line breaks still end them; [`clean_response`]
/// then folds the query onto one line.
pub fn clean_generated(raw: &str) -> String {
    let text = BLOCK_COMMENT_RE.replace_all(raw, " ");
    let text = LINE_COMMENT_RE.replace_all(&text, "${1}");
    normalize_generated(&clean_response(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowflow_core::RelationshipType;
    use test_case::test_case;

    #[test_case("MATCH (n) RETURN n" ; "match")]
    #[test_case("  optional match (n) return n" ; "lowercase optional")]
    #[test_case("WITH 1 AS x RETURN x" ; "with")]
    #[test_case("CALL db.labels()" ; "call")]
    fn test_gate_accepts_allowed_keywords(query: &str) {
        assert_eq!(QueryGate::default().check(query), Ok(()));
    }

    #[test_case("DETACH DELETE (n)", "DETACH" ; "detach delete")]
    #[test_case("DROP INDEX foo", "DROP" ; "drop")]
    #[test_case("Here is your query: MATCH (n)", "HERE" ; "prose")]
    #[test_case("", "" ; "empty")]
    #[test_case("// MATCH (n)", "" ; "comment")]
    fn test_gate_rejects(query: &str, keyword: &str) {
        assert_eq!(QueryGate::default().check(query), Err(keyword.to_string()));
    }

    #[test]
    fn test_custom_allow_list() {
        let gate = QueryGate::new(vec!["match".to_string(), " ".to_string()]);
        assert_eq!(gate.allowed(), ["MATCH"]);
        assert!(gate.check("MERGE (n {id: 'x'})").is_err());
    }

    #[test]
    fn test_normalize_generated() {
        assert_eq!(
            normalize_generated("cypher MATCH (n) RETURN n LIMIT 10;"),
            "MATCH (n) RETURN n LIMIT 10"
        );
        assert_eq!(normalize_generated("MATCH (n) RETURN n"), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_clean_generated_drops_comments_before_folding_lines() {
        let raw = "```cypher\nMATCH (n:Concept) // concepts only\nRETURN n LIMIT 5\n```";
        assert_eq!(clean_generated(raw), "MATCH (n:Concept) RETURN n LIMIT 5");

        let raw = "// list concepts\nMATCH (n) /* any label */ RETURN n;";
        assert_eq!(clean_generated(raw), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_clean_generated_keeps_urls_in_literals() {
        let raw = "MATCH (n {source: 'http://docs.example.com/refunds'})\nRETURN n";
        assert_eq!(
            clean_generated(raw),
            "MATCH (n {source: 'http://docs.example.com/refunds'}) RETURN n"
        );
    }

    #[test]
    fn test_node_statement_uses_parameters() {
        let node = KnowledgeNode::new("refund-policy", NodeLabel::Concept, "Refund policy")
            .with_content("30 days");
        let statement = merge_node("doc-1", &node).unwrap();

        assert_eq!(
            statement.text,
            "MERGE (n {id: $id}) SET n:`Concept`, n += $properties, n.doc_id = $doc_id"
        );
        assert_eq!(statement.params["id"], "refund-policy");
        assert_eq!(statement.params["doc_id"], "doc-1");
        assert_eq!(statement.params["properties"]["name"], "Refund policy");
        assert_eq!(statement.params["properties"]["content"], "30 days");
    }

    #[test]
    fn test_relationship_statement() {
        let rel = KnowledgeRelationship::new("a", "b", RelationshipType::HasTag);
        let statement = merge_relationship(&rel).unwrap();

        assert!(statement.text.contains("MERGE (a)-[r:`HAS_TAG`]->(b)"));
        assert_eq!(statement.params["start_id"], "a");
        assert_eq!(statement.params["end_id"], "b");
        assert!(statement.params["properties"].get("context").is_none());
    }

    #[test]
    fn test_document_anchor() {
        let statement = merge_document("doc-9");
        assert_eq!(statement.text, "MERGE (d:`Document` {id: $doc_id})");
        assert_eq!(statement.params["doc_id"], "doc-9");
    }
}
