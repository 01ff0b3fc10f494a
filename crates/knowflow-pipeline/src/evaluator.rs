//! LLM-as-judge scoring of retrieved vector evidence
//!
//! The evaluator never fails: model errors and unusable output both produce
//! [`EvaluationResult::sentinel`], which asks for refinement.

use knowflow_core::llm_output::clean_response;
use knowflow_core::types::ChunkScore;
use knowflow_core::{EvaluationResult, EvidenceItem, LanguageModel};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompts::{evaluation_user_prompt, EVALUATION_SYSTEM_PROMPT};

pub struct RetrievalQualityEvaluator {
    llm: Arc<dyn LanguageModel>,
}

impl RetrievalQualityEvaluator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn evaluate(&self, query: &str, evidence: &[EvidenceItem]) -> EvaluationResult {
        let chunks: Vec<&str> = evidence.iter().map(|item| item.text.as_str()).collect();
        let prompt = evaluation_user_prompt(query, &chunks);

        let raw = match self.llm.complete(EVALUATION_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(model = self.llm.name(), error = %err, "Retrieval evaluation call failed");
                return EvaluationResult::sentinel();
            }
        };

        match parse_evaluation(&raw) {
            Some(result) => {
                info!(
                    score = result.overall_quality_score,
                    needs_improvement = result.needs_improvement,
                    chunks = chunks.len(),
                    "Evaluated retrieval quality"
                );
                result
            }
            None => {
                warn!("Evaluation output is not a usable JSON object, assuming poor quality");
                debug!(output = %raw, "Unusable evaluation output");
                EvaluationResult::sentinel()
            }
        }
    }
}

/// Parse a cleaned evaluation; `None` when there is no JSON object with a score
///
/// `missing_aspects` and `alternative_search_terms` are read from the top level, then
/// from `suggested_improvements`. `needs_improvement` in the output is ignored.
pub fn parse_evaluation(raw: &str) -> Option<EvaluationResult> {
    let cleaned = clean_response(raw);
    let value: Value = serde_json::from_str(&cleaned).ok()?;
    let object = value.as_object()?;
    let score = number(object.get("overall_quality_score")?)?;

    let nested = object
        .get("suggested_improvements")
        .and_then(Value::as_object);
    let missing_aspects = list_field(object, nested, "missing_aspects");
    let alternative_search_terms = list_field(object, nested, "alternative_search_terms");

    let mut result = EvaluationResult::scored(score, missing_aspects, alternative_search_terms);
    result.chunk_scores = object
        .get("chunk_scores")
        .and_then(Value::as_array)
        .map(|scores| {
            scores
                .iter()
                .enumerate()
                .filter_map(|(position, entry)| chunk_score(position, entry))
                .collect()
        })
        .unwrap_or_default();
    result.quality_summary = object
        .get("quality_summary")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(result)
}

/// Reformulated queries for the next retrieval round
///
/// `"{query} {aspect}"` per missing aspect, then each alternative term verbatim.
pub fn suggest_alternatives(query: &str, evaluation: &EvaluationResult) -> Vec<String> {
    if !evaluation.needs_improvement {
        return Vec::new();
    }

    let from_aspects = evaluation
        .missing_aspects
        .iter()
        .map(|aspect| aspect.trim())
        .filter(|aspect| !aspect.is_empty())
        .map(|aspect| format!("{query} {aspect}"));
    let from_terms = evaluation
        .alternative_search_terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(str::to_string);

    from_aspects.chain(from_terms).collect()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
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

fn list_field(
    object: &Map<String, Value>,
    nested: Option<&Map<String, Value>>,
    key: &str,
) -> Vec<String> {
    let top = strings(object.get(key));
    if !top.is_empty() {
        return top;
    }
    strings(nested.and_then(|n| n.get(key)))
}

fn chunk_score(position: usize, entry: &Value) -> Option<ChunkScore> {
    let object = entry.as_object()?;
    let chunk_index = object
        .get("chunk_index")
        .and_then(Value::as_u64)
        .map(|i| i as usize)
        .unwrap_or(position);
    Some(ChunkScore {
        chunk_index,
        relevance_score: number(object.get("relevance_score")?)?,
        reasoning: object
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
