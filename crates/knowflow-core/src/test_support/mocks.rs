//! In-memory collaborators for testing
//!
//! Each double implements one of the [`crate::traits`] contracts and is:
//!
//! - **Deterministic**: same inputs, same outputs
//! - **Configurable**: scripted responses and error injection
//! - **Observable**: call history and counters for assertions
//!
//! # Examples
//!
//! ```rust,ignore
//! use knowflow_core::test_support::MockLanguageModel;
//! use knowflow_core::traits::LanguageModel;
//!
//! # async fn example() -> knowflow_core::Result<()> {
//! let llm = MockLanguageModel::new();
//! llm.respond_to("query decomposition", "What is pricing?\nWhat are support hours?");
//!
//! let out = llm.complete("You are a query decomposition assistant", "...").await?;
//! assert!(out.contains("support hours"));
//! assert_eq!(llm.call_count(), 1);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{KnowflowError, Result};
use crate::traits::{
    BlobMetadata, BlobStorage, DocumentStore, EmbeddingModel, LanguageModel, SessionStore,
    VectorStore,
};
use crate::types::{
    ConversationSession, Document, DocumentChunk, DocumentQuery, DocumentStatus, Message,
    NewMessage, ScoredChunk, SearchFilter, SessionId, UserId, VectorEntry,
};
use crate::vector_math::cosine_similarity;

// ============================================================================
// Language model
// ============================================================================

type Scripted = std::result::Result<String, String>;

#[derive(Debug, Default)]
struct MockLanguageModelState {
    /// (prompt substring, queued responses); the last response repeats
    rules: Vec<(String, VecDeque<Scripted>)>,
    default_response: Option<String>,
    fail_all: Option<String>,
    call_history: Vec<(String, String)>,
}

/// Scripted language model
///
/// Responses are selected by the first rule whose pattern occurs in the system prompt,
/// then by the first rule whose pattern occurs in the user prompt. A rule's queue is
/// consumed front to back and its final entry repeats forever.
#[derive(Debug, Clone)]
pub struct MockLanguageModel {
    name: String,
    state: Arc<Mutex<MockLanguageModelState>>,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::named("mock-llm")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockLanguageModelState::default())),
        }
    }

    /// Queue a response for prompts containing `pattern`
    pub fn respond_to(&self, pattern: &str, response: impl Into<String>) -> &Self {
        self.push_rule(pattern, Ok(response.into()));
        self
    }

    /// Queue a failure for prompts containing `pattern`
    pub fn fail_on(&self, pattern: &str, message: impl Into<String>) -> &Self {
        self.push_rule(pattern, Err(message.into()));
        self
    }

    /// Response returned when no rule matches
    pub fn set_default_response(&self, response: impl Into<String>) {
        self.state.lock().default_response = Some(response.into());
    }

    /// Fail every call regardless of rules
    pub fn set_fail_all(&self, message: Option<String>) {
        self.state.lock().fail_all = message;
    }

    pub fn call_history(&self) -> Vec<(String, String)> {
        self.state.lock().call_history.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().call_history.len()
    }

    /// Number of calls whose system prompt contained `pattern`
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.state
            .lock()
            .call_history
            .iter()
            .filter(|(system, _)| system.contains(pattern))
            .count()
    }

    fn push_rule(&self, pattern: &str, response: Scripted) {
        let mut state = self.state.lock();
        if let Some((_, queue)) = state.rules.iter_mut().find(|(p, _)| p == pattern) {
            queue.push_back(response);
        } else {
            state
                .rules
                .push((pattern.to_string(), VecDeque::from([response])));
        }
    }
}

fn next_scripted(queue: &mut VecDeque<Scripted>) -> Option<Scripted> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let mut state = self.state.lock();
        state
            .call_history
            .push((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(message) = state.fail_all.clone() {
            return Err(KnowflowError::external(self.name.clone(), message));
        }

        let by_system = state
            .rules
            .iter()
            .position(|(pattern, _)| system_prompt.contains(pattern.as_str()));
        let index = by_system.or_else(|| {
            state
                .rules
                .iter()
                .position(|(pattern, _)| user_prompt.contains(pattern.as_str()))
        });

        let scripted = match index {
            Some(i) => next_scripted(&mut state.rules[i].1),
            None => None,
        };

        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(KnowflowError::external(self.name.clone(), message)),
            None => Ok(state
                .default_response
                .clone()
                .unwrap_or_else(|| "Mock response".to_string())),
        }
    }
}

// ============================================================================
// Embeddings
// ============================================================================

/// Deterministic hashed bag-of-words embedder
///
/// Texts sharing words get positive similarity, which is enough for retrieval tests.
#[derive(Debug, Clone)]
pub struct MockEmbeddingModel {
    dimensions: usize,
    embed_calls: Arc<AtomicUsize>,
    batch_calls: Arc<AtomicUsize>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl Default for MockEmbeddingModel {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MockEmbeddingModel {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            batch_calls: Arc::new(AtomicUsize::new(0)),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_fail_with(&self, message: Option<String>) {
        *self.fail_with.lock() = message;
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn check_failure(&self) -> Result<()> {
        match self.fail_with.lock().clone() {
            Some(message) => Err(KnowflowError::external("mock-embedding", message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    fn name(&self) -> &str {
        "mock-embedding"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

// ============================================================================
// Vector store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryVectorState {
    entries: Vec<VectorEntry>,
    search_count: usize,
    fail_with: Option<String>,
}

/// Brute-force cosine search over entries held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryVectorStore {
    state: Arc<Mutex<MemoryVectorState>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_count(&self) -> usize {
        self.state.lock().search_count
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_with(&self, message: Option<String>) {
        self.state.lock().fail_with = message;
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn name(&self) -> &str {
        "memory-vector"
    }

    async fn add(&self, entries: Vec<VectorEntry>) -> Result<usize> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_with.clone() {
            return Err(KnowflowError::external("memory-vector", message));
        }
        let count = entries.len();
        state.entries.extend(entries);
        Ok(count)
    }

    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let mut state = self.state.lock();
        state.search_count += 1;
        if let Some(message) = state.fail_with.clone() {
            return Err(KnowflowError::external("memory-vector", message));
        }

        let mut hits: Vec<ScoredChunk> = state
            .entries
            .iter()
            .filter(|e| filter.matches(e.metadata.owner_id, &e.metadata.doc_id))
            .map(|e| ScoredChunk {
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(embedding, &e.embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| e.metadata.doc_id != doc_id);
        Ok(before - state.entries.len())
    }
}

// ============================================================================
// Session store
// ============================================================================

#[derive(Debug, Default)]
struct MemorySessionState {
    sessions: BTreeMap<SessionId, ConversationSession>,
    messages: Vec<Message>,
    next_session_id: SessionId,
    next_message_id: i64,
    mutations: usize,
}

/// Session and message store held in memory
///
/// `mutations()` counts every write, so tests can assert that rejected operations left
/// the store untouched.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    state: Arc<Mutex<MemorySessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutations(&self) -> usize {
        self.state.lock().mutations
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }
}

impl MemorySessionState {
    fn push_message(&mut self, session_id: SessionId, message: NewMessage) -> Message {
        self.next_message_id += 1;
        let stored = Message {
            id: self.next_message_id,
            session_id,
            sender: message.sender,
            content: message.content,
            context_used: message.context_used,
            created_at: Utc::now(),
        };
        self.messages.push(stored.clone());
        stored
    }
}

fn missing_session(id: SessionId) -> KnowflowError {
    KnowflowError::not_found(format!("session {id}"))
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, owner_id: UserId, title: &str) -> Result<ConversationSession> {
        let mut state = self.state.lock();
        state.next_session_id += 1;
        state.mutations += 1;
        let now = Utc::now();
        let session = ConversationSession {
            id: state.next_session_id,
            owner_id,
            title: title.to_string(),
            memory_context: Map::new(),
            recent_node_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            last_activity: now,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ConversationSession>> {
        Ok(self.state.lock().sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, owner_id: UserId) -> Result<Vec<ConversationSession>> {
        let mut sessions: Vec<_> = self
            .state
            .lock()
            .sessions
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    async fn rename_session(&self, id: SessionId, title: &str) -> Result<ConversationSession> {
        let mut state = self.state.lock();
        let session = state.sessions.get_mut(&id).ok_or_else(|| missing_session(id))?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        let renamed = session.clone();
        state.mutations += 1;
        Ok(renamed)
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.sessions.remove(&id).is_none() {
            return Err(missing_session(id));
        }
        state.messages.retain(|m| m.session_id != id);
        state.mutations += 1;
        Ok(())
    }

    async fn append_message(&self, session_id: SessionId, message: NewMessage) -> Result<Message> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session_id) {
            return Err(missing_session(session_id));
        }
        state.mutations += 1;
        Ok(state.push_message(session_id, message))
    }

    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        Ok(self
            .state
            .lock()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn record_follow_up(
        &self,
        id: SessionId,
        new_node_ids: &[String],
        memory_patch: Map<String, Value>,
        turns: Vec<NewMessage>,
    ) -> Result<ConversationSession> {
        let mut state = self.state.lock();
        let session = state.sessions.get_mut(&id).ok_or_else(|| missing_session(id))?;
        session.apply_follow_up(new_node_ids, &memory_patch, Utc::now());
        let updated = session.clone();
        for turn in turns {
            state.push_message(id, turn);
        }
        state.mutations += 1;
        Ok(updated)
    }
}

// ============================================================================
// Document store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryDocumentState {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Vec<DocumentChunk>>,
    status_history: HashMap<String, Vec<DocumentStatus>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<MemoryDocumentState>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status a document has held, oldest first
    pub fn status_history(&self, doc_id: &str) -> Vec<DocumentStatus> {
        self.state
            .lock()
            .status_history
            .get(doc_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_document(&self, document: Document) -> Result<Document> {
        let mut state = self.state.lock();
        if state.documents.contains_key(&document.doc_id) {
            return Err(KnowflowError::validation(format!(
                "document {} already exists",
                document.doc_id
            )));
        }
        state
            .status_history
            .entry(document.doc_id.clone())
            .or_default()
            .push(document.status);
        state
            .documents
            .insert(document.doc_id.clone(), document.clone());
        Ok(document)
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        Ok(self.state.lock().documents.get(doc_id).cloned())
    }

    async fn update_status(
        &self,
        doc_id: &str,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document> {
        let mut state = self.state.lock();
        let document = state
            .documents
            .get_mut(doc_id)
            .ok_or_else(|| KnowflowError::not_found(format!("document {doc_id}")))?;
        let now = Utc::now();
        document.status = status;
        document.error_message = error_message;
        document.updated_at = now;
        if status == DocumentStatus::Indexed {
            document.indexed_at = Some(now);
        }
        let updated = document.clone();
        state
            .status_history
            .entry(doc_id.to_string())
            .or_default()
            .push(status);
        Ok(updated)
    }

    async fn list_documents(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let state = self.state.lock();
        let mut documents: Vec<_> = state
            .documents
            .values()
            .filter(|d| d.owner_id == query.owner_id)
            .filter(|d| query.status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn replace_chunks(&self, doc_id: &str, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let count = chunks.len();
        self.state.lock().chunks.insert(doc_id.to_string(), chunks);
        Ok(count)
    }

    async fn list_chunks(&self, doc_id: &str) -> Result<Vec<DocumentChunk>> {
        Ok(self
            .state
            .lock()
            .chunks
            .get(doc_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Blob storage
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStorage {
    blobs: Arc<Mutex<BTreeMap<String, (Vec<u8>, BlobMetadata)>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    fn name(&self) -> &str {
        "memory-blob"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let metadata = BlobMetadata {
            key: key.to_string(),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };
        self.blobs.lock().insert(key.to_string(), (bytes, metadata));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| KnowflowError::not_found(format!("blob {key}")))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMetadata>> {
        Ok(self
            .blobs
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, (_, meta))| meta.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    #[tokio::test]
    async fn test_mock_llm_queue_repeats_last() {
        let llm = MockLanguageModel::new();
        llm.respond_to("evaluation", "first").respond_to("evaluation", "second");

        assert_eq!(llm.complete("evaluation expert", "").await.unwrap(), "first");
        assert_eq!(llm.complete("evaluation expert", "").await.unwrap(), "second");
        assert_eq!(llm.complete("evaluation expert", "").await.unwrap(), "second");
        assert_eq!(llm.complete("other", "").await.unwrap(), "Mock response");
        assert_eq!(llm.calls_matching("evaluation"), 3);
    }

    #[tokio::test]
    async fn test_mock_llm_failure_injection() {
        let llm = MockLanguageModel::named("flaky");
        llm.fail_on("extract", "boom");

        let err = llm.complete("extract this", "").await.unwrap_err();
        assert_eq!(err.service(), Some("flaky"));
    }

    #[tokio::test]
    async fn test_memory_vector_store_filters_and_ranks() {
        let embedder = MockEmbeddingModel::default();
        let store = MemoryVectorStore::new();
        let texts = ["refunds within 30 days", "support hours are 9 to 5"];
        let mut entries = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            entries.push(VectorEntry {
                text: text.to_string(),
                embedding: embedder.embed(text).await.unwrap(),
                metadata: ChunkMetadata {
                    doc_id: format!("d{i}"),
                    owner_id: 1,
                    chunk_index: 0,
                },
            });
        }
        store.add(entries).await.unwrap();

        let query = embedder.embed("refunds policy").await.unwrap();
        let hits = store.search(&query, 5, &SearchFilter::owner(1)).await.unwrap();
        assert_eq!(hits[0].text, "refunds within 30 days");

        let none = store.search(&query, 5, &SearchFilter::owner(2)).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(store.search_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_session_store_cascade_delete() {
        let store = MemorySessionStore::new();
        let session = store.create_session(1, "t").await.unwrap();
        store
            .append_message(session.id, NewMessage::user("hi"))
            .await
            .unwrap();
        store.delete_session(session.id).await.unwrap();

        assert!(store.get_session(session.id).await.unwrap().is_none());
        assert_eq!(store.message_count(), 0);
    }
}
