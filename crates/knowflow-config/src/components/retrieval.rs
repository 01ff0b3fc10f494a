//! Retrieval pipeline tuning

use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Vector results per search
    pub top_k: Option<usize>,
    /// Quality-driven refinement rounds per sub-question (at most 2)
    pub max_refinement_rounds: Option<usize>,
    /// Timeout applied to every model and store call
    pub call_timeout_secs: Option<u64>,
    /// Follow-up traversal hops when the caller does not choose
    pub default_context_window: Option<usize>,
    /// Upper bound on follow-up traversal hops (at most 5)
    pub max_context_window: Option<usize>,
}

impl RetrievalConfig {
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(defaults::DEFAULT_TOP_K)
    }

    /// Configured rounds, never above the hard ceiling
    pub fn max_refinement_rounds(&self) -> usize {
        self.max_refinement_rounds
            .unwrap_or(defaults::DEFAULT_MAX_REFINEMENT_ROUNDS)
            .min(defaults::MAX_REFINEMENT_ROUNDS)
    }

    pub fn call_timeout_secs(&self) -> u64 {
        self.call_timeout_secs
            .unwrap_or(defaults::DEFAULT_CALL_TIMEOUT_SECS)
    }

    pub fn max_context_window(&self) -> usize {
        self.max_context_window
            .unwrap_or(defaults::MAX_CONTEXT_WINDOW)
            .min(defaults::MAX_CONTEXT_WINDOW)
    }

    pub fn default_context_window(&self) -> usize {
        self.default_context_window
            .unwrap_or(defaults::DEFAULT_CONTEXT_WINDOW)
            .min(self.max_context_window())
    }
}
