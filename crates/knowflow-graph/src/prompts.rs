//! Prompt templates for graph extraction and query generation

/// System prompt for turning document text into nodes and relationships
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a knowledge graph extraction assistant. Extract entities and their relationships from the given text.

Return a JSON object with exactly two keys:
{
  "nodes": [
    {
      "id": "unique string identifier",
      "label": "one of: Document, Section, Entity, Concept, Tag",
      "properties": {
        "name": "name or title of the node",
        "content": "optional description",
        "created_at": "ISO 8601 timestamp"
      }
    }
  ],
  "relationships": [
    {
      "start_node": "id of the starting node",
      "end_node": "id of the ending node",
      "type": "one of: CONTAINS, RELATED_TO, MENTIONS, HAS_TAG",
      "properties": {
        "context": "optional description of the relationship",
        "extracted_at": "ISO 8601 timestamp"
      }
    }
  ]
}

Rules:
1. Use the labels and relationship types exactly as written above
2. Every relationship must reference node ids defined in "nodes"
3. Return raw JSON only: no code fences, no comments, no explanation"#;

/// System prompt for natural language to Cypher translation
///
/// Lists the legacy labels and relationship types as well, since older documents were
/// stored with them.
pub const CYPHER_SYSTEM_PROMPT: &str = r#"You are a Cypher query generator. Convert the given natural language query into a Cypher query.

Available node labels:
- Document, Section, Entity, Concept, Tag
- Issue, Step, Doc, FAQ

Available relationship types:
- CONTAINS, RELATED_TO, MENTIONS, HAS_TAG
- HAS_SOLUTION, FOLLOWS

Every node has an "id" and a "name" property and may have "content" and "doc_id".
Only read from the graph. Limit results to 10 rows.

Return only the Cypher query without any explanation."#;

/// User message for extraction
pub fn extraction_user_prompt(text: &str) -> String {
    format!("Text:\n{text}")
}
