//! Neo4j HTTP backend against a mocked transactional endpoint

use knowflow_core::{ErrorKind, GraphDatabase, Statement};
use knowflow_graph::Neo4jHttpDatabase;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMMIT: &str = "/db/neo4j/tx/commit";

#[tokio::test]
async fn test_run_maps_rows_to_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .and(body_partial_json(json!({
            "statements": [{
                "statement": "MATCH (n {id: $id}) RETURN n.id AS id, n.name AS name",
                "parameters": {"id": "refunds"}
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "columns": ["id", "name"],
                "data": [{"row": ["refunds", "Refunds"], "meta": [null, null]}]
            }],
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = Neo4jHttpDatabase::new(server.uri(), "neo4j");
    let records = db
        .run(
            Statement::new("MATCH (n {id: $id}) RETURN n.id AS id, n.name AS name")
                .param("id", "refunds"),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "Refunds");
}

#[tokio::test]
async fn test_transaction_sends_all_statements_with_basic_auth() {
    let server = MockServer::start().await;
    // neo4j:secret
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .and(header("Authorization", "Basic bmVvNGo6c2VjcmV0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"results": [{}, {}], "errors": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = Neo4jHttpDatabase::new(server.uri(), "neo4j").with_auth("neo4j", "secret");
    db.run_in_transaction(vec![
        Statement::new("MERGE (d:`Document` {id: $doc_id})").param("doc_id", "d1"),
        Statement::new("MERGE (n:`Tag` {id: $id})").param("id", "t1"),
    ])
    .await
    .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["statements"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_errors_array_is_external_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "errors": [{
                "code": "Neo.ClientError.Statement.SyntaxError",
                "message": "Invalid input 'X'"
            }]
        })))
        .mount(&server)
        .await;

    let db = Neo4jHttpDatabase::new(server.uri(), "neo4j");
    let err = db.run(Statement::new("MATCH X")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
    assert_eq!(err.service(), Some("Neo4j"));
    assert!(err.to_string().contains("SyntaxError"));
}

#[tokio::test]
async fn test_unauthorized_status_is_external_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let db = Neo4jHttpDatabase::new(server.uri(), "neo4j").with_auth("neo4j", "wrong");
    let err = db.run(Statement::new("MATCH (n) RETURN n")).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMMIT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": [], "errors": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let db = Neo4jHttpDatabase::new(server.uri(), "neo4j").with_timeout(1);
    let err = db.run(Statement::new("MATCH (n) RETURN n")).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn test_empty_transaction_makes_no_request() {
    let server = MockServer::start().await;
    let db = Neo4jHttpDatabase::new(server.uri(), "neo4j");
    db.run_in_transaction(Vec::new()).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}
