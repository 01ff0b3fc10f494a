//! Integration tests for RetrievalOrchestrator
//!
//! Cover decomposition fan-out, bounded refinement, evidence fusion, backend failures,
//! per-call timeouts and whole-request cancellation.

mod common;

use anyhow::Result;
use common::*;
use knowflow_core::{ContextUsed, ErrorKind, EvidenceSource, GraphRecord, KnowflowError, QueryRequest};
use knowflow_pipeline::{OrchestratorConfig, MAX_REFINEMENT_ROUNDS};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn graph_record(value: serde_json::Value) -> GraphRecord {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Single question
// ============================================================================

#[tokio::test]
async fn test_simple_query_is_answered_from_one_retrieval() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Refunds are accepted within 30 days of purchase.")
        .await;
    h.llm.respond_to(DECOMPOSITION, "What is the refund policy?");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);
    h.llm.respond_to(ANSWER, "Refunds are accepted within 30 days.");

    let response = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER))
        .await?;

    assert_eq!(response.message, "Refunds are accepted within 30 days.");
    let ContextUsed::Single {
        vector_results,
        graph_results,
    } = &response.context_used
    else {
        panic!("expected a single-question context, got {:?}", response.context_used);
    };
    assert_eq!(vector_results.len(), 1);
    assert_eq!(vector_results[0].source, EvidenceSource::Vector);
    assert!(graph_results.is_empty());
    assert_eq!(h.llm.calls_matching(SYNTHESIS), 0);
    Ok(())
}

#[tokio::test]
async fn test_single_sub_question_answers_the_original_query() -> Result<()> {
    let h = Harness::new();
    h.llm.respond_to(DECOMPOSITION, "1. refund policy");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    h.orchestrator
        .process(&QueryRequest::new("Tell me about refunds", OWNER))
        .await?;

    let answered: Vec<String> = h
        .llm
        .call_history()
        .into_iter()
        .filter(|(system, _)| system.contains(ANSWER))
        .map(|(_, user)| user)
        .collect();
    assert_eq!(answered, vec!["Tell me about refunds"]);
    Ok(())
}

#[tokio::test]
async fn test_decomposition_disabled_skips_the_model() -> Result<()> {
    let h = Harness::new();
    h.orchestrator
        .process(
            &QueryRequest::new("What are the support hours and the refund policy?", OWNER)
                .with_decomposition(false)
                .with_evaluation(false),
        )
        .await?;

    assert_eq!(h.llm.calls_matching(DECOMPOSITION), 0);
    assert_eq!(h.llm.calls_matching(EVALUATION), 0);
    assert_eq!(h.llm.calls_matching(ANSWER), 1);
    Ok(())
}

#[tokio::test]
async fn test_blank_query_is_rejected_before_any_call() {
    let h = Harness::new();
    let err = h
        .orchestrator
        .process(&QueryRequest::new("   ", OWNER))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(h.llm.call_count(), 0);
    assert_eq!(h.vectors.search_count(), 0);
}

// ============================================================================
// Fan-out and synthesis
// ============================================================================

#[tokio::test]
async fn test_multi_part_query_fans_out_and_synthesizes_once() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Refunds are accepted within 30 days.").await;
    h.seed_chunk(OWNER, "doc-1", 1, "Support is open 9am to 5pm on weekdays.").await;
    h.llm.respond_to(
        DECOMPOSITION,
        "1. What is the refund policy?\n2. What are the support hours?",
    );
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);
    h.llm.respond_to(ANSWER, "Partial answer");
    h.llm.respond_to(SYNTHESIS, "Refunds take 30 days and support runs 9 to 5.");

    let response = h
        .orchestrator
        .process(&QueryRequest::new(
            "What is the refund policy and what are the support hours?",
            OWNER,
        ))
        .await?;

    assert_eq!(response.message, "Refunds take 30 days and support runs 9 to 5.");
    let ContextUsed::Synthesized {
        sub_responses,
        synthesized_response,
    } = &response.context_used
    else {
        panic!("expected a synthesized context");
    };
    assert_eq!(synthesized_response, &response.message);
    assert_eq!(sub_responses.len(), 2);
    assert_eq!(sub_responses[0].question, "What is the refund policy?");
    assert_eq!(sub_responses[1].question, "What are the support hours?");
    assert!(sub_responses
        .iter()
        .all(|sub| matches!(sub.context_used, ContextUsed::Single { .. })));

    assert_eq!(h.llm.calls_matching(SYNTHESIS), 1);
    assert_eq!(h.llm.calls_matching(ANSWER), 2);
    assert_eq!(h.llm.calls_matching(CYPHER), 2);

    let (_, synthesis_prompt) = h
        .llm
        .call_history()
        .into_iter()
        .find(|(system, _)| system.contains(SYNTHESIS))
        .unwrap();
    assert!(synthesis_prompt.starts_with(
        "Original question: What is the refund policy and what are the support hours?"
    ));
    assert_eq!(synthesis_prompt.matches("Sub-question result:\nPartial answer").count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_decomposition_is_capped_at_three_sub_questions() -> Result<()> {
    let h = Harness::new();
    h.llm.respond_to(DECOMPOSITION, "a?\nb?\nc?\nd?\ne?");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    let response = h
        .orchestrator
        .process(&QueryRequest::new("a, b, c, d and e?", OWNER))
        .await?;

    assert_eq!(response.context_used.sub_responses().len(), 3);
    assert_eq!(h.llm.calls_matching(ANSWER), 3);
    Ok(())
}

// ============================================================================
// Evidence scope and fusion
// ============================================================================

#[tokio::test]
async fn test_retrieval_is_scoped_to_owner_and_documents() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Refund policy for doc one.").await;
    h.seed_chunk(OWNER, "doc-2", 0, "Refund policy for doc two.").await;
    h.seed_chunk(OTHER_OWNER, "doc-3", 0, "Refund policy another user uploaded.")
        .await;

    let scoped = h
        .orchestrator
        .process(
            &QueryRequest::new("refund policy", OWNER)
                .with_documents(vec!["doc-2".to_string()])
                .with_decomposition(false)
                .with_evaluation(false),
        )
        .await?;
    let texts: Vec<&str> = scoped
        .context_used
        .vector_results()
        .iter()
        .map(|item| item.text.as_str())
        .collect();
    assert_eq!(texts, vec!["Refund policy for doc two."]);

    let unscoped = h
        .orchestrator
        .process(
            &QueryRequest::new("refund policy", OWNER)
                .with_decomposition(false)
                .with_evaluation(false),
        )
        .await?;
    assert_eq!(unscoped.context_used.vector_results().len(), 2);
    assert!(unscoped
        .context_used
        .vector_results()
        .iter()
        .all(|item| !item.text.contains("another user")));
    Ok(())
}

#[tokio::test]
async fn test_graph_records_reach_the_answer_prompt() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Refunds are accepted within 30 days.").await;
    h.graph_db.set_query_result(vec![graph_record(json!({
        "labels": ["Concept"],
        "properties": {"name": "Refund window", "content": "30 days"},
    }))]);

    let response = h
        .orchestrator
        .process(
            &QueryRequest::new("How long is the refund window?", OWNER)
                .with_decomposition(false)
                .with_evaluation(false),
        )
        .await?;

    assert_eq!(response.context_used.graph_results().len(), 1);
    let (system, _) = h
        .llm
        .call_history()
        .into_iter()
        .find(|(system, _)| system.contains(ANSWER))
        .unwrap();
    assert!(system.contains("Refunds are accepted within 30 days."));
    assert!(system.contains("Type: Concept\nProperties: content: 30 days, name: Refund window"));
    Ok(())
}

// ============================================================================
// Evaluation and refinement
// ============================================================================

#[tokio::test]
async fn test_refinement_stops_after_two_rounds() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Our store sells shoes.").await;
    h.llm
        .respond_to(EVALUATION, evaluation(2.0, &["refund window", "return policy"]));

    let response = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await?;

    assert_eq!(h.llm.calls_matching(EVALUATION), 1 + MAX_REFINEMENT_ROUNDS);
    assert_eq!(h.embedder.embed_calls(), 1);
    assert_eq!(h.embedder.batch_calls(), MAX_REFINEMENT_ROUNDS);
    assert!(h.embedder.embed_calls() + h.embedder.batch_calls() <= 3);
    // one initial search plus two alternatives per round
    assert_eq!(h.vectors.search_count(), 1 + 2 * MAX_REFINEMENT_ROUNDS);
    assert_eq!(response.context_used.vector_results().len(), 1 + 2 * MAX_REFINEMENT_ROUNDS);
    Ok(())
}

#[tokio::test]
async fn test_good_evaluation_skips_refinement() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Refunds are accepted within 30 days.").await;
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    h.orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await?;

    assert_eq!(h.llm.calls_matching(EVALUATION), 1);
    assert_eq!(h.embedder.batch_calls(), 0);
    assert_eq!(h.vectors.search_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_improving_evaluation_ends_refinement_early() -> Result<()> {
    let h = Harness::new();
    h.llm
        .respond_to(EVALUATION, evaluation(3.0, &["refund window"]))
        .respond_to(EVALUATION, GOOD_EVALUATION);

    h.orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await?;

    assert_eq!(h.llm.calls_matching(EVALUATION), 2);
    assert_eq!(h.embedder.batch_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_evaluation_is_bounded_and_still_answers() -> Result<()> {
    let h = Harness::new();
    h.seed_chunk(OWNER, "doc-1", 0, "Refunds are accepted within 30 days.").await;
    h.llm.respond_to(EVALUATION, "not json");
    h.llm.respond_to(ANSWER, "Refunds are accepted within 30 days.");

    let response = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await?;

    assert_eq!(response.message, "Refunds are accepted within 30 days.");
    assert_eq!(h.llm.calls_matching(EVALUATION), 1 + MAX_REFINEMENT_ROUNDS);
    // the sentinel suggests nothing, so no extra searches run
    assert_eq!(h.vectors.search_count(), 1);
    assert_eq!(h.embedder.batch_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_configured_rounds_cannot_exceed_the_ceiling() -> Result<()> {
    let llm = MockLanguageModel::new();
    let config = OrchestratorConfig {
        max_refinement_rounds: 10,
        ..Default::default()
    };
    let h = Harness::build(Arc::new(llm.clone()), llm, config);
    h.llm.respond_to(EVALUATION, evaluation(1.0, &["anything"]));

    h.orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await?;

    assert_eq!(h.embedder.batch_calls(), MAX_REFINEMENT_ROUNDS);
    Ok(())
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_vector_backend_failure_surfaces_with_its_service() {
    let h = Harness::new();
    h.vectors.set_fail_with(Some("connection refused".to_string()));

    let err = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(err.service(), Some("VectorStore"));
    assert_eq!(h.llm.calls_matching(ANSWER), 0);
}

#[tokio::test]
async fn test_graph_backend_failure_surfaces_with_its_service() {
    let h = Harness::new();
    h.graph_db.set_fail_with(Some("bolt handshake failed".to_string()));

    let err = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await
        .unwrap_err();

    assert_eq!(err.service(), Some("GraphService"));
    let payload = err.payload();
    assert_eq!(payload.kind, ErrorKind::ExternalServiceFailure);
    assert!(payload.error.is_some());
}

#[tokio::test]
async fn test_answer_failure_surfaces() {
    let h = Harness::new();
    h.llm.fail_on(ANSWER, "rate limited");

    let err = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false))
        .await
        .unwrap_err();

    assert_eq!(err.service(), Some("mock-llm"));
}

#[tokio::test]
async fn test_decomposition_failure_falls_back_to_the_query() -> Result<()> {
    let h = Harness::new();
    h.llm.fail_on(DECOMPOSITION, "model overloaded");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    let response = h
        .orchestrator
        .process(&QueryRequest::new("What is the refund policy?", OWNER))
        .await?;

    assert!(matches!(response.context_used, ContextUsed::Single { .. }));
    Ok(())
}

// ============================================================================
// Timeouts and cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_synthesis_timeout_surfaces_as_external_failure() {
    let llm = MockLanguageModel::new();
    let slow = SlowLanguageModel::new(llm.clone(), SYNTHESIS, Duration::from_secs(120));
    let h = Harness::build(Arc::new(slow), llm, OrchestratorConfig::default());
    h.llm.respond_to(DECOMPOSITION, "First part?\nSecond part?");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    let err = h
        .orchestrator
        .process(&QueryRequest::new("First part and second part?", OWNER))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(err.service(), Some("slow-llm"));
    assert_eq!(h.llm.calls_matching(ANSWER), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_sub_answer_is_left_out_of_synthesis() -> Result<()> {
    let llm = MockLanguageModel::new();
    let slow = SlowLanguageModel::new(llm.clone(), ANSWER, Duration::from_secs(120))
        .with_user_pattern("Second part?");
    let h = Harness::build(Arc::new(slow), llm, OrchestratorConfig::default());
    h.llm.respond_to(DECOMPOSITION, "First part?\nSecond part?");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);
    h.llm.respond_to(SYNTHESIS, "Only the first part could be answered.");

    let response = h
        .orchestrator
        .process(&QueryRequest::new("First part and second part?", OWNER))
        .await?;

    assert_eq!(response.message, "Only the first part could be answered.");
    let sub_responses = response.context_used.sub_responses();
    assert_eq!(sub_responses.len(), 1);
    assert_eq!(sub_responses[0].question, "First part?");
    assert_eq!(h.llm.calls_matching(SYNTHESIS), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_every_sub_answer_timing_out_fails_the_request() {
    let llm = MockLanguageModel::new();
    let slow = SlowLanguageModel::new(llm.clone(), ANSWER, Duration::from_secs(120));
    let h = Harness::build(Arc::new(slow), llm, OrchestratorConfig::default());
    h.llm.respond_to(DECOMPOSITION, "First part?\nSecond part?");
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    let err = h
        .orchestrator
        .process(&QueryRequest::new("First part and second part?", OWNER))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{err:?}");
    assert_eq!(h.llm.calls_matching(SYNTHESIS), 0);
}

#[tokio::test(start_paused = true)]
async fn test_decomposition_timeout_uses_the_original_query() -> Result<()> {
    let llm = MockLanguageModel::new();
    let slow = SlowLanguageModel::new(llm.clone(), DECOMPOSITION, Duration::from_secs(120));
    let h = Harness::build(Arc::new(slow), llm, OrchestratorConfig::default());
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    let response = h
        .orchestrator
        .process(&QueryRequest::new("First part and second part?", OWNER))
        .await?;

    assert!(matches!(response.context_used, ContextUsed::Single { .. }));
    assert_eq!(h.llm.calls_matching(DECOMPOSITION), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_request_makes_no_calls() {
    let h = Harness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .orchestrator
        .process_with_cancel(&QueryRequest::new("What is the refund policy?", OWNER), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, KnowflowError::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_an_in_flight_answer() {
    let llm = MockLanguageModel::new();
    let slow = SlowLanguageModel::new(llm.clone(), ANSWER, Duration::from_secs(30));
    let h = Harness::build(Arc::new(slow), llm, OrchestratorConfig::default());
    h.llm.respond_to(EVALUATION, GOOD_EVALUATION);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let err = h
        .orchestrator
        .process_with_cancel(
            &QueryRequest::new("What is the refund policy?", OWNER).with_decomposition(false),
            cancel,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "{err:?}");
}
