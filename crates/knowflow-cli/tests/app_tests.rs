//! Wiring tests against real SQLite and filesystem storage
//!
//! Nothing here reaches a model or graph server: the exercised paths stop before the
//! first network call.

use anyhow::Result;
use knowflow_cli::App;
use knowflow_config::KnowflowConfig;
use knowflow_core::{DocumentStatus, ErrorKind};
use tempfile::TempDir;

fn app_in(dir: &TempDir) -> Result<App> {
    let mut config = KnowflowConfig::default();
    config.storage.database_path = Some(dir.path().join("data").join("knowflow.db"));
    config.storage.blob_root = Some(dir.path().join("blobs"));
    App::from_config(config)
}

#[tokio::test]
async fn test_session_commands_persist_across_app_instances() -> Result<()> {
    let dir = TempDir::new()?;
    let created = {
        let app = app_in(&dir)?;
        let session = app
            .conversations
            .create_session(1, Some("Refund questions"))
            .await?;
        app.conversations
            .rename_session(1, session.id, "Refunds")
            .await?;
        session
    };

    let app = app_in(&dir)?;
    let sessions = app.conversations.list_sessions(1).await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, created.id);
    assert_eq!(sessions[0].title, "Refunds");
    assert!(app.conversations.messages(1, created.id).await?.is_empty());

    let err = app
        .conversations
        .delete_session(2, created.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

    app.conversations.delete_session(1, created.id).await?;
    assert!(app.conversations.list_sessions(1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_upload_lands_in_blob_root_and_database() -> Result<()> {
    let dir = TempDir::new()?;
    let app = app_in(&dir)?;

    let document = app
        .ingestor
        .upload(3, "policy.md", "text/markdown", b"# Refunds\n30 days".to_vec())
        .await?;

    let stored = app.documents.get_document(&document.doc_id).await?.unwrap();
    assert_eq!(stored.status, DocumentStatus::Processing);
    let on_disk = dir
        .path()
        .join("blobs")
        .join("user_3")
        .join("documents")
        .join(format!("{}.md", document.doc_id));
    assert_eq!(std::fs::read(on_disk)?, b"# Refunds\n30 days");
    Ok(())
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let app = app_in(&dir)?;

    let err = app
        .ingestor
        .upload(3, "scan.pdf", "application/pdf", vec![0x25, 0x50])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(!dir.path().join("blobs").join("user_3").exists());
    Ok(())
}
