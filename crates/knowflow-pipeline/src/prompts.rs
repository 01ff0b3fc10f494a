//! Prompt templates for decomposition, evaluation, answering and follow-up turns

use knowflow_core::ContextNode;
use serde_json::{Map, Value};

use crate::fusion::render_properties;

/// Sentence the model must answer with when the context is insufficient
pub const NOT_AVAILABLE: &str = "The answer is not available in the provided context.";

pub const DECOMPOSITION_SYSTEM_PROMPT: &str = "You are a query decomposition assistant. Break down complex queries into 2-3 simpler sub-questions.
Rules:
1. If the query is already simple, return it as a single question
2. Each sub-question should be self-contained
3. Maximum 3 sub-questions
4. Return only the sub-questions, one per line, nothing else";

pub const EVALUATION_SYSTEM_PROMPT: &str =
    "You are a retrieval quality evaluation expert. You must return only valid JSON.";

const EVALUATION_SCHEMA: &str = r#"{
  "chunk_scores": [
    {"chunk_index": 0, "relevance_score": 0-10, "reasoning": "why this score"}
  ],
  "missing_aspects": ["list of query aspects not covered"],
  "redundant_information": ["list of redundant content"],
  "suggested_improvements": {
    "additional_info_needed": ["list of missing information"],
    "alternative_search_terms": ["list of suggested search terms"]
  },
  "overall_quality_score": 0-10,
  "quality_summary": "brief evaluation summary"
}"#;

/// User message asking for a quality assessment of `chunks` against `query`
pub fn evaluation_user_prompt(query: &str, chunks: &[&str]) -> String {
    let listed = if chunks.is_empty() {
        "(no chunks were retrieved)".to_string()
    } else {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{i}] {chunk}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Evaluate the quality of retrieved context for the given query.\n\n\
         Query: {query}\n\n\
         Retrieved Context Chunks:\n{listed}\n\n\
         Analyze the retrieval quality and return a JSON object with the following structure:\n\
         {EVALUATION_SCHEMA}\n\n\
         Return ONLY valid JSON, no other text."
    )
}

/// Grounding prompt used to answer one sub-question from fused context
pub fn answer_system_prompt(context: &str) -> String {
    format!(
        "You are a helpful, reasoning assistant. Answer the user's question based primarily on the provided context. You are allowed to:\n\
         - Rephrase, summarize, or logically infer information from the context.\n\
         - Use reasoning to clarify or structure the answer when necessary.\n\n\
         However:\n\
         - Do not fabricate facts not supported by the context.\n\
         - If the answer cannot reasonably be inferred from the context, reply: \"{NOT_AVAILABLE}\"\n\n\
         Context:\n{context}"
    )
}

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "Synthesize a comprehensive response from the sub-question results.
The response should:
1. Flow naturally and be coherent
2. Address all aspects of the original question
3. Maintain technical accuracy
4. Be concise but complete";

pub fn synthesis_user_prompt(original_query: &str, sub_answers: &[&str]) -> String {
    let combined = sub_answers
        .iter()
        .map(|answer| format!("Sub-question result:\n{answer}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Original question: {original_query}\n\nSub-question results:\n{combined}")
}

/// System prompt for a follow-up turn grounded in traversed graph nodes
pub fn follow_up_system_prompt(nodes: &[ContextNode], memory: &Map<String, Value>) -> String {
    let context = if nodes.is_empty() {
        "(no related knowledge was found)".to_string()
    } else {
        nodes
            .iter()
            .map(|node| {
                format!(
                    "Node {} ({})\nProperties: {}",
                    node.id,
                    node.label.as_deref().unwrap_or("Unknown"),
                    render_properties(&node.properties)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    let memory = if memory.is_empty() {
        "(empty)".to_string()
    } else {
        serde_json::to_string_pretty(memory).unwrap_or_default()
    };

    format!(
        "You are a conversational assistant continuing a chat session. Answer the follow-up message using the knowledge graph context and the conversation memory below.\n\
         - Refer to entities by name when you use them.\n\
         - Do not fabricate facts not supported by the context.\n\
         - If the answer cannot reasonably be inferred from the context, reply: \"{NOT_AVAILABLE}\"\n\n\
         Knowledge graph context:\n{context}\n\n\
         Conversation memory:\n{memory}"
    )
}
