//! Conversation sessions and chat turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::query::{SessionId, UserId};

/// Maximum number of node ids remembered per session
pub const RECENT_NODE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,
    pub owner_id: UserId,
    pub title: String,
    #[serde(default)]
    pub memory_context: Map<String, Value>,
    /// Most recent first, deduplicated, at most [`RECENT_NODE_LIMIT`] entries
    #[serde(default)]
    pub recent_node_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationSession {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Apply one follow-up turn to the in-memory session
    ///
    /// Store implementations call this inside their write transaction.
    pub fn apply_follow_up(
        &mut self,
        new_node_ids: &[String],
        memory_patch: &Map<String, Value>,
        at: DateTime<Utc>,
    ) {
        self.recent_node_ids = merge_recent_node_ids(new_node_ids, &self.recent_node_ids);
        for (key, value) in memory_patch {
            self.memory_context.insert(key.clone(), value.clone());
        }
        self.last_activity = at;
        self.updated_at = at;
    }
}

/// `dedupe(new + old)[..10]`, keeping first occurrences
pub fn merge_recent_node_ids(new_ids: &[String], old_ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    new_ids
        .iter()
        .chain(old_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .take(RECENT_NODE_LIMIT)
        .cloned()
        .collect()
}

/// Default title for a session created without one
pub fn default_session_title(at: DateTime<Utc>) -> String {
    format!("Chat {}", at.format("%Y-%m-%d %H:%M"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Sender::User),
            "assistant" => Some(Sender::Assistant),
            _ => None,
        }
    }
}

/// A persisted chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub session_id: SessionId,
    pub sender: Sender,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// A chat turn that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender: Sender,
    pub content: String,
    pub context_used: Option<Value>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            context_used: None,
        }
    }

    pub fn assistant(content: impl Into<String>, context_used: Option<Value>) -> Self {
        Self {
            sender: Sender::Assistant,
            content: content.into(),
            context_used,
        }
    }
}
