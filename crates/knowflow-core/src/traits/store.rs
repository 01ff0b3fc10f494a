//! Relational persistence for sessions, messages and documents
//!
//! The pipeline depends only on CRUD by id and owner-scoped listing. Ownership checks
//! happen in the caller; stores never filter by the current user on their own.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::{
    ConversationSession, Document, DocumentChunk, DocumentQuery, DocumentStatus, Message,
    NewMessage, SessionId, UserId,
};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, owner_id: UserId, title: &str) -> Result<ConversationSession>;

    async fn get_session(&self, id: SessionId) -> Result<Option<ConversationSession>>;

    /// Sessions of one owner, most recently active first
    async fn list_sessions(&self, owner_id: UserId) -> Result<Vec<ConversationSession>>;

    async fn rename_session(&self, id: SessionId, title: &str) -> Result<ConversationSession>;

    /// Delete a session together with its messages
    async fn delete_session(&self, id: SessionId) -> Result<()>;

    async fn append_message(&self, session_id: SessionId, message: NewMessage) -> Result<Message>;

    /// Messages in insertion order
    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>>;

    /// Atomically merge a follow-up turn into the persisted session
    ///
    /// Reads the current row, applies
    /// [`ConversationSession::apply_follow_up`], writes it back and appends `turns` in
    /// one transaction. Either the session update and every turn land, or nothing does.
    async fn record_follow_up(
        &self,
        id: SessionId,
        new_node_ids: &[String],
        memory_patch: Map<String, Value>,
        turns: Vec<NewMessage>,
    ) -> Result<ConversationSession>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: Document) -> Result<Document>;

    async fn get_document(&self, doc_id: &str) -> Result<Option<Document>>;

    /// Move a document to `status`; `Indexed` also stamps `indexed_at`
    async fn update_status(
        &self,
        doc_id: &str,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document>;

    async fn list_documents(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Replace every chunk row of a document
    async fn replace_chunks(&self, doc_id: &str, chunks: Vec<DocumentChunk>) -> Result<usize>;

    async fn list_chunks(&self, doc_id: &str) -> Result<Vec<DocumentChunk>>;
}
