//! Retrieval quality evaluation results

use serde::{Deserialize, Serialize};

/// Scores below this are considered in need of refinement
pub const QUALITY_THRESHOLD: f64 = 7.0;

/// Relevance of a single retrieved chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkScore {
    pub chunk_index: usize,
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub overall_quality_score: f64,
    pub needs_improvement: bool,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    #[serde(default)]
    pub alternative_search_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk_scores: Vec<ChunkScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_summary: Option<String>,
}

impl EvaluationResult {
    /// Build a result with `needs_improvement` derived from the score
    ///
    /// The score is clamped to `[0, 10]`.
    pub fn scored(
        overall_quality_score: f64,
        missing_aspects: Vec<String>,
        alternative_search_terms: Vec<String>,
    ) -> Self {
        let score = if overall_quality_score.is_finite() {
            overall_quality_score.clamp(0.0, 10.0)
        } else {
            0.0
        };
        Self {
            overall_quality_score: score,
            needs_improvement: score < QUALITY_THRESHOLD,
            missing_aspects,
            alternative_search_terms,
            chunk_scores: Vec::new(),
            quality_summary: None,
        }
    }

    /// Result used whenever the evaluator cannot produce a real assessment
    pub fn sentinel() -> Self {
        Self::scored(0.0, Vec::new(), Vec::new())
    }
}
