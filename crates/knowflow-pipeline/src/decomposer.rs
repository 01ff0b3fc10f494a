//! Splitting compound queries into independent sub-questions

use knowflow_core::LanguageModel;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompts::DECOMPOSITION_SYSTEM_PROMPT;

/// Upper bound on sub-questions per query
pub const MAX_SUB_QUESTIONS: usize = 3;

static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[.)]|[-*•]|\(\d+\))(?:\s+|$)").unwrap());

pub struct QueryDecomposer {
    llm: Arc<dyn LanguageModel>,
}

impl QueryDecomposer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// One to three sub-questions; the query itself whenever the model is unhelpful
    pub async fn decompose(&self, query: &str) -> Vec<String> {
        debug!(query, "Decomposing query");
        match self.llm.complete(DECOMPOSITION_SYSTEM_PROMPT, query).await {
            Ok(raw) => {
                let sub_questions = parse_sub_questions(&raw, query);
                info!(count = sub_questions.len(), "Query decomposed");
                sub_questions
            }
            Err(err) => {
                warn!(model = self.llm.name(), error = %err, "Query decomposition failed, using the original query");
                vec![query.to_string()]
            }
        }
    }
}

/// One sub-question per non-blank line, list markers removed, at most three
pub fn parse_sub_questions(raw: &str, query: &str) -> Vec<String> {
    let sub_questions: Vec<String> = raw
        .lines()
        .map(str::trim)
        .map(|line| LIST_MARKER_RE.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_SUB_QUESTIONS)
        .collect();

    if sub_questions.is_empty() {
        vec![query.to_string()]
    } else {
        sub_questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowflow_core::test_support::MockLanguageModel;

    #[test]
    fn test_simple_query_is_returned_unchanged() {
        let query = "What is the refund policy?";
        assert_eq!(parse_sub_questions(query, query), vec![query]);
    }

    #[test]
    fn test_markers_and_blank_lines_are_stripped() {
        let raw = "1. What is the pricing?\n\n  2) What are the support hours?\n- Who handles escalations?\n* extra";
        assert_eq!(
            parse_sub_questions(raw, "q"),
            vec![
                "What is the pricing?",
                "What are the support hours?",
                "Who handles escalations?"
            ]
        );
    }

    #[test]
    fn test_blank_output_falls_back_to_query() {
        assert_eq!(parse_sub_questions("  \n\n", "original"), vec!["original"]);
        assert_eq!(parse_sub_questions("- \n1.", "original"), vec!["original"]);
    }

    #[test]
    fn test_numbers_inside_questions_survive() {
        assert_eq!(
            parse_sub_questions("Is 2.5 the latest version?", "q"),
            vec!["Is 2.5 the latest version?"]
        );
    }

    #[tokio::test]
    async fn test_model_output_becomes_sub_questions() {
        let llm = MockLanguageModel::new();
        llm.respond_to("query decomposition", "What is pricing?\nWhat are support hours?");
        let decomposer = QueryDecomposer::new(Arc::new(llm.clone()));

        let subs = decomposer.decompose("Explain pricing and support hours").await;
        assert_eq!(subs, vec!["What is pricing?", "What are support hours?"]);
        assert_eq!(llm.call_history()[0].1, "Explain pricing and support hours");
    }

    #[tokio::test]
    async fn test_model_failure_returns_query() {
        let llm = MockLanguageModel::new();
        llm.set_fail_all(Some("rate limited".to_string()));
        let decomposer = QueryDecomposer::new(Arc::new(llm));

        assert_eq!(decomposer.decompose("a and b").await, vec!["a and b"]);
    }
}
