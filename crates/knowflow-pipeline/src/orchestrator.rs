//! Query processing: decomposition, dual-source retrieval, refinement, fusion, synthesis
//!
//! ```text
//! Received -> [Decomposed?] -> per sub-question(Retrieving -> Evaluating -> Refining(0..2))
//!          -> Synthesizing -> Answered | Failed
//! ```
//!
//! Sub-questions are answered concurrently and joined before synthesis. Every model and
//! store call goes through a [`CallGuard`], so one request can be cancelled as a whole.

use futures::future::try_join_all;
use knowflow_config::RetrievalConfig;
use knowflow_core::{
    ContextUsed, EvaluationResult, EvidenceItem, GraphRecord, KnowflowError, LanguageModel,
    QueryRequest, QueryResponse, Result, SearchFilter, SubResponse,
};
use knowflow_graph::{KnowledgeGraphStore, GRAPH_SERVICE};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decomposer::QueryDecomposer;
use crate::evaluator::{suggest_alternatives, RetrievalQualityEvaluator};
use crate::evidence::{EvidenceStore, VECTOR_SERVICE};
use crate::fusion::fuse;
use crate::guard::CallGuard;
use crate::prompts::{answer_system_prompt, synthesis_user_prompt, SYNTHESIS_SYSTEM_PROMPT};

/// Hard ceiling on refinement rounds per sub-question
pub const MAX_REFINEMENT_ROUNDS: usize = 2;

const DECOMPOSER_SERVICE: &str = "QueryDecomposer";
const EVALUATOR_SERVICE: &str = "RetrievalQualityEvaluator";

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Vector hits per search
    pub top_k: usize,
    /// Clamped to [`MAX_REFINEMENT_ROUNDS`]
    pub max_refinement_rounds: usize,
    pub call_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_refinement_rounds: MAX_REFINEMENT_ROUNDS,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_retrieval(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k(),
            max_refinement_rounds: config.max_refinement_rounds(),
            call_timeout: Duration::from_secs(config.call_timeout_secs()),
        }
    }
}

/// Evidence and answer for one sub-question
struct SubAnswer {
    message: String,
    vector_results: Vec<EvidenceItem>,
    graph_results: Vec<GraphRecord>,
}

impl SubAnswer {
    fn context_used(self) -> (String, ContextUsed) {
        (
            self.message,
            ContextUsed::Single {
                vector_results: self.vector_results,
                graph_results: self.graph_results,
            },
        )
    }
}

pub struct RetrievalOrchestrator {
    decomposer: QueryDecomposer,
    evaluator: RetrievalQualityEvaluator,
    evidence: EvidenceStore,
    graph: Arc<KnowledgeGraphStore>,
    llm: Arc<dyn LanguageModel>,
    config: OrchestratorConfig,
}

impl RetrievalOrchestrator {
    pub fn new(
        decomposer: QueryDecomposer,
        evaluator: RetrievalQualityEvaluator,
        evidence: EvidenceStore,
        graph: Arc<KnowledgeGraphStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::with_config(
            decomposer,
            evaluator,
            evidence,
            graph,
            llm,
            OrchestratorConfig::default(),
        )
    }

    pub fn with_config(
        decomposer: QueryDecomposer,
        evaluator: RetrievalQualityEvaluator,
        evidence: EvidenceStore,
        graph: Arc<KnowledgeGraphStore>,
        llm: Arc<dyn LanguageModel>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            decomposer,
            evaluator,
            evidence,
            graph,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Answer `request` from the owner's documents
    ///
    /// Writes nothing; recording chat turns is the caller's job.
    pub async fn process(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.process_with_cancel(request, CancellationToken::new())
            .await
    }

    /// [`RetrievalOrchestrator::process`], abandoned with [`KnowflowError::Cancelled`]
    /// once `cancel` fires
    pub async fn process_with_cancel(
        &self,
        request: &QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse> {
        request.validate()?;
        let guard = CallGuard::new(self.config.call_timeout, cancel);
        let filter =
            SearchFilter::owner(request.owner_id).with_documents(request.document_ids.clone());

        let sub_questions = if request.use_decomposition {
            self.decompose(&guard, &request.query).await?
        } else {
            vec![request.query.clone()]
        };
        info!(
            owner_id = request.owner_id,
            sub_questions = sub_questions.len(),
            decomposition = request.use_decomposition,
            evaluation = request.use_evaluation,
            "Processing query"
        );

        if sub_questions.len() <= 1 {
            let answer = self
                .answer(&guard, &request.query, &filter, request.use_evaluation)
                .await?;
            let (message, context_used) = answer.context_used();
            return Ok(QueryResponse {
                message,
                context_used,
            });
        }

        // A timed-out sub-answer is left out of synthesis; any other failure aborts the join
        let (guard, filter) = (&guard, &filter);
        let outcomes = try_join_all(sub_questions.iter().map(|question| async move {
            match self
                .answer(guard, question, filter, request.use_evaluation)
                .await
            {
                Err(err) if err.is_timeout() => {
                    warn!(question, error = %err, "Sub-question answer timed out, leaving it out");
                    Ok(Err(err))
                }
                other => other.map(Ok),
            }
        }))
        .await?;

        let mut timed_out = None;
        let mut sub_responses = Vec::with_capacity(outcomes.len());
        for (question, outcome) in sub_questions.into_iter().zip(outcomes) {
            match outcome {
                Ok(answer) => {
                    let (message, context_used) = answer.context_used();
                    sub_responses.push(SubResponse {
                        question,
                        message,
                        context_used,
                    });
                }
                Err(err) => timed_out = Some(err),
            }
        }
        if let Some(err) = timed_out.filter(|_| sub_responses.is_empty()) {
            return Err(err);
        }

        let synthesized = self.synthesize(guard, &request.query, &sub_responses).await?;
        Ok(QueryResponse {
            message: synthesized.clone(),
            context_used: ContextUsed::Synthesized {
                sub_responses,
                synthesized_response: synthesized,
            },
        })
    }

    async fn decompose(&self, guard: &CallGuard, query: &str) -> Result<Vec<String>> {
        match guard
            .run_infallible(DECOMPOSER_SERVICE, self.decomposer.decompose(query))
            .await
        {
            Err(err) if err.is_timeout() => {
                warn!(error = %err, "Query decomposition timed out, using the original query");
                Ok(vec![query.to_string()])
            }
            other => other,
        }
    }

    async fn answer(
        &self,
        guard: &CallGuard,
        question: &str,
        filter: &SearchFilter,
        use_evaluation: bool,
    ) -> Result<SubAnswer> {
        let (vector_results, graph_results) = tokio::try_join!(
            self.vector_evidence(guard, question, filter),
            self.graph_evidence(guard, question),
        )?;

        let vector_results = if use_evaluation {
            self.refine(guard, question, filter, vector_results).await?
        } else {
            vector_results
        };

        let context = fuse(&vector_results, &graph_results);
        debug!(
            question,
            vector = vector_results.len(),
            graph = graph_results.len(),
            context_chars = context.len(),
            "Answering from fused context"
        );
        let message = guard
            .run(
                self.llm.name(),
                self.llm.complete(&answer_system_prompt(&context), question),
            )
            .await
            .map_err(|e| self.fail("answer", e))?;

        Ok(SubAnswer {
            message,
            vector_results,
            graph_results,
        })
    }

    async fn vector_evidence(
        &self,
        guard: &CallGuard,
        query: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<EvidenceItem>> {
        let search = self.evidence.search(query, self.config.top_k, filter);
        match guard.run(VECTOR_SERVICE, search).await {
            Err(err) if err.is_timeout() => {
                warn!(query, error = %err, "Vector retrieval timed out, continuing without it");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn graph_evidence(&self, guard: &CallGuard, query: &str) -> Result<Vec<GraphRecord>> {
        match guard.run(GRAPH_SERVICE, self.graph.query(query)).await {
            Ok(records) => {
                info!(records = records.len(), "Graph retrieval complete");
                Ok(records)
            }
            Err(err) if err.is_timeout() => {
                warn!(query, error = %err, "Graph retrieval timed out, continuing without it");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Evaluate, reformulate and re-retrieve while quality stays below threshold
    ///
    /// Only vector evidence is evaluated.
    async fn refine(
        &self,
        guard: &CallGuard,
        query: &str,
        filter: &SearchFilter,
        mut results: Vec<EvidenceItem>,
    ) -> Result<Vec<EvidenceItem>> {
        let max_rounds = self.config.max_refinement_rounds.min(MAX_REFINEMENT_ROUNDS);
        let mut evaluation = self.evaluate(guard, query, &results).await?;
        let mut round = 0;

        while evaluation.needs_improvement && round < max_rounds {
            let alternatives = suggest_alternatives(query, &evaluation);
            debug!(round = round + 1, alternatives = alternatives.len(), "Refining retrieval");
            if !alternatives.is_empty() {
                let search = self
                    .evidence
                    .search_many(&alternatives, self.config.top_k, filter);
                match guard.run(VECTOR_SERVICE, search).await {
                    Ok(additional) => results.extend(additional),
                    Err(err) if err.is_timeout() => {
                        warn!(round = round + 1, error = %err, "Refinement retrieval timed out");
                    }
                    Err(err) => return Err(err),
                }
            }
            evaluation = self.evaluate(guard, query, &results).await?;
            round += 1;
        }

        info!(
            rounds = round,
            score = evaluation.overall_quality_score,
            evidence = results.len(),
            "Retrieval refinement finished"
        );
        Ok(results)
    }

    async fn evaluate(
        &self,
        guard: &CallGuard,
        query: &str,
        evidence: &[EvidenceItem],
    ) -> Result<EvaluationResult> {
        match guard
            .run_infallible(EVALUATOR_SERVICE, self.evaluator.evaluate(query, evidence))
            .await
        {
            Err(err) if err.is_timeout() => {
                warn!(error = %err, "Retrieval evaluation timed out, assuming poor quality");
                Ok(EvaluationResult::sentinel())
            }
            other => other,
        }
    }

    async fn synthesize(
        &self,
        guard: &CallGuard,
        query: &str,
        sub_responses: &[SubResponse],
    ) -> Result<String> {
        let answers: Vec<&str> = sub_responses.iter().map(|r| r.message.as_str()).collect();
        let prompt = synthesis_user_prompt(query, &answers);
        let synthesized = guard
            .run(self.llm.name(), self.llm.complete(SYNTHESIS_SYSTEM_PROMPT, &prompt))
            .await
            .map_err(|e| self.fail("synthesize", e))?;
        info!(sub_responses = sub_responses.len(), "Synthesized response");
        Ok(synthesized)
    }

    fn fail(&self, operation: &str, err: KnowflowError) -> KnowflowError {
        if !err.is_cancelled() {
            error!(model = self.llm.name(), operation, error = %err, "Language model call failed");
        }
        err
    }
}
