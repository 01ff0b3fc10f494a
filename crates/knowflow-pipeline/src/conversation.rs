//! Chat sessions: ownership checks, chat turns and graph-grounded follow-ups
//!
//! Every operation on an existing session loads it first and verifies the owner, so a
//! missing session is `NotFound` and someone else's session is `Authorization`, both
//! before anything is written. Follow-ups on one session are serialized by a per-session
//! lock on top of the store's atomic `record_follow_up`, which persists the session update
//! and both chat turns together.

use chrono::Utc;
use knowflow_config::{GraphConfig, RetrievalConfig};
use knowflow_core::types::default_session_title;
use knowflow_core::{
    ContextNode, ConversationSession, KnowflowError, LanguageModel, Message, NewMessage,
    QueryRequest, QueryResponse, Result, SessionId, SessionStore, UserId,
};
use knowflow_graph::{KnowledgeGraphStore, GRAPH_SERVICE, MAX_TRAVERSAL_HOPS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::guard::CallGuard;
use crate::keyed_lock::KeyedLocks;
use crate::orchestrator::RetrievalOrchestrator;
use crate::prompts::follow_up_system_prompt;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    /// Hops used when a follow-up does not ask for a window
    pub default_context_window: usize,
    pub max_context_window: usize,
    pub max_traversal_nodes: usize,
    pub call_timeout: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            default_context_window: 2,
            max_context_window: MAX_TRAVERSAL_HOPS,
            max_traversal_nodes: 1000,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl ConversationConfig {
    pub fn from_config(retrieval: &RetrievalConfig, graph: &GraphConfig) -> Self {
        Self {
            default_context_window: retrieval.default_context_window(),
            max_context_window: retrieval.max_context_window(),
            max_traversal_nodes: graph.max_traversal_nodes(),
            call_timeout: Duration::from_secs(retrieval.call_timeout_secs()),
        }
    }

    /// Hops for a requested window, never above [`MAX_TRAVERSAL_HOPS`]
    pub fn hops(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_context_window)
            .min(self.max_context_window)
            .min(MAX_TRAVERSAL_HOPS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub message: String,
    /// Anchors for traversal; the session's recent nodes when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_node_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

impl FollowUpRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_nodes(mut self, node_ids: Vec<String>) -> Self {
        self.referenced_node_ids = Some(node_ids);
        self
    }

    pub fn with_window(mut self, hops: usize) -> Self {
        self.context_window = Some(hops);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpResponse {
    pub response: String,
    pub context_nodes: Vec<ContextNode>,
    pub memory_context: Map<String, Value>,
    pub referenced_node_ids: Vec<String>,
}

pub struct ConversationManager {
    sessions: Arc<dyn SessionStore>,
    orchestrator: Arc<RetrievalOrchestrator>,
    graph: Arc<KnowledgeGraphStore>,
    llm: Arc<dyn LanguageModel>,
    config: ConversationConfig,
    locks: KeyedLocks<SessionId>,
}

impl ConversationManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        orchestrator: Arc<RetrievalOrchestrator>,
        graph: Arc<KnowledgeGraphStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::with_config(
            sessions,
            orchestrator,
            graph,
            llm,
            ConversationConfig::default(),
        )
    }

    pub fn with_config(
        sessions: Arc<dyn SessionStore>,
        orchestrator: Arc<RetrievalOrchestrator>,
        graph: Arc<KnowledgeGraphStore>,
        llm: Arc<dyn LanguageModel>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            sessions,
            orchestrator,
            graph,
            llm,
            config,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn create_session(
        &self,
        owner: UserId,
        title: Option<&str>,
    ) -> Result<ConversationSession> {
        let title = match title.map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => default_session_title(Utc::now()),
        };
        let session = self.sessions.create_session(owner, &title).await?;
        info!(session_id = session.id, owner_id = owner, "Created chat session");
        Ok(session)
    }

    /// Most recently active first
    pub async fn list_sessions(&self, owner: UserId) -> Result<Vec<ConversationSession>> {
        self.sessions.list_sessions(owner).await
    }

    pub async fn get_session(&self, owner: UserId, id: SessionId) -> Result<ConversationSession> {
        self.authorized_session(owner, id).await
    }

    pub async fn rename_session(
        &self,
        owner: UserId,
        id: SessionId,
        title: &str,
    ) -> Result<ConversationSession> {
        let title = title.trim();
        if title.is_empty() {
            return Err(KnowflowError::validation("session title must not be empty"));
        }
        self.authorized_session(owner, id).await?;
        let renamed = self.sessions.rename_session(id, title).await?;
        info!(session_id = id, "Renamed chat session");
        Ok(renamed)
    }

    /// Delete a session and its messages
    pub async fn delete_session(&self, owner: UserId, id: SessionId) -> Result<()> {
        self.authorized_session(owner, id).await?;
        let _held = self.locks.lock(id).await;
        self.sessions.delete_session(id).await?;
        info!(session_id = id, "Deleted chat session");
        Ok(())
    }

    pub async fn messages(&self, owner: UserId, id: SessionId) -> Result<Vec<Message>> {
        self.authorized_session(owner, id).await?;
        self.sessions.list_messages(id).await
    }

    /// Run a query and, when it names a session, record both turns
    pub async fn chat(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.chat_with_cancel(request, CancellationToken::new())
            .await
    }

    pub async fn chat_with_cancel(
        &self,
        request: &QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse> {
        request.validate()?;
        if let Some(session_id) = request.session_id {
            self.authorized_session(request.owner_id, session_id).await?;
        }

        let response = self
            .orchestrator
            .process_with_cancel(request, cancel.clone())
            .await?;
        if cancel.is_cancelled() {
            return Err(KnowflowError::Cancelled);
        }

        if let Some(session_id) = request.session_id {
            let context_used = serde_json::to_value(&response.context_used)?;
            self.sessions
                .append_message(session_id, NewMessage::user(request.query.clone()))
                .await?;
            self.sessions
                .append_message(
                    session_id,
                    NewMessage::assistant(response.message.clone(), Some(context_used)),
                )
                .await?;
            debug!(session_id, "Recorded chat turns");
        }
        Ok(response)
    }

    pub async fn follow_up(
        &self,
        owner: UserId,
        session_id: SessionId,
        request: FollowUpRequest,
    ) -> Result<FollowUpResponse> {
        self.follow_up_with_cancel(owner, session_id, request, CancellationToken::new())
            .await
    }

    /// Answer a follow-up from the graph neighbourhood of the session's recent nodes
    pub async fn follow_up_with_cancel(
        &self,
        owner: UserId,
        session_id: SessionId,
        request: FollowUpRequest,
        cancel: CancellationToken,
    ) -> Result<FollowUpResponse> {
        if request.message.trim().is_empty() {
            return Err(KnowflowError::validation("message must not be empty"));
        }

        let _held = self.locks.lock(session_id).await;
        let session = self.authorized_session(owner, session_id).await?;

        let anchors = match &request.referenced_node_ids {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => session.recent_node_ids.clone(),
        };
        let hops = self.config.hops(request.context_window);
        let guard = CallGuard::new(self.config.call_timeout, cancel);

        let expansion = self
            .graph
            .expand(&anchors, hops, self.config.max_traversal_nodes);
        let context_nodes = match guard.run(GRAPH_SERVICE, expansion).await {
            Err(err) if err.is_timeout() => {
                warn!(session_id, error = %err, "Graph traversal timed out, answering without context");
                Vec::new()
            }
            other => other?,
        };
        let referenced_node_ids: Vec<String> =
            context_nodes.iter().map(|node| node.id.clone()).collect();
        debug!(
            session_id,
            anchors = anchors.len(),
            hops,
            nodes = context_nodes.len(),
            "Collected follow-up context"
        );

        let system_prompt = follow_up_system_prompt(&context_nodes, &session.memory_context);
        let response = guard
            .run(self.llm.name(), self.llm.complete(&system_prompt, &request.message))
            .await?;
        guard.check()?;

        let patch = memory_patch(&session, &request.message, &referenced_node_ids);
        let turns = vec![
            NewMessage::user(request.message.clone()),
            NewMessage::assistant(
                response.clone(),
                Some(json!({ "referenced_node_ids": referenced_node_ids })),
            ),
        ];
        let updated = self
            .sessions
            .record_follow_up(session_id, &referenced_node_ids, patch, turns)
            .await?;

        info!(
            session_id,
            nodes = referenced_node_ids.len(),
            recent = updated.recent_node_ids.len(),
            "Answered follow-up"
        );
        Ok(FollowUpResponse {
            response,
            context_nodes,
            memory_context: updated.memory_context,
            referenced_node_ids,
        })
    }

    async fn authorized_session(
        &self,
        owner: UserId,
        id: SessionId,
    ) -> Result<ConversationSession> {
        let session = self
            .sessions
            .get_session(id)
            .await?
            .ok_or_else(|| KnowflowError::not_found(format!("chat session {id}")))?;
        if !session.is_owned_by(owner) {
            warn!(session_id = id, user_id = owner, "Rejected access to another user's session");
            return Err(KnowflowError::unauthorized("access denied to this chat session"));
        }
        Ok(session)
    }

    /// Sessions with a follow-up or delete in flight
    pub fn active_session_locks(&self) -> usize {
        self.locks.len()
    }
}

fn memory_patch(
    session: &ConversationSession,
    message: &str,
    referenced_node_ids: &[String],
) -> Map<String, Value> {
    let turn_count = session
        .memory_context
        .get("turn_count")
        .and_then(Value::as_u64)
        .unwrap_or(0)
        + 1;

    let mut patch = Map::new();
    patch.insert("last_message".to_string(), Value::from(message));
    patch.insert(
        "last_referenced_node_ids".to_string(),
        Value::from(referenced_node_ids.to_vec()),
    );
    patch.insert("turn_count".to_string(), Value::from(turn_count));
    patch
}
