//! SessionStore implementation for SQLite

use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};
use crate::row::{parse_json, parse_timestamp, timestamp};
use async_trait::async_trait;
use chrono::Utc;
use knowflow_core::{
    ConversationSession, Message, NewMessage, Result, Sender, SessionId, SessionStore, UserId,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

const SESSION_COLUMNS: &str =
    "id, owner_id, title, memory_context, recent_node_ids, created_at, updated_at, last_activity";

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn missing(id: SessionId) -> SqliteError {
    SqliteError::NotFound(format!("session {id}"))
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<ConversationSession> {
    let memory_context: String = row.get(3)?;
    let recent_node_ids: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    let last_activity: String = row.get(7)?;

    Ok(ConversationSession {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        memory_context: parse_json(3, &memory_context)?,
        recent_node_ids: parse_json(4, &recent_node_ids)?,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
        last_activity: parse_timestamp(7, &last_activity)?,
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let sender: String = row.get(2)?;
    let context_used: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sender: Sender::parse(&sender).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown sender {sender}").into(),
            )
        })?,
        content: row.get(3)?,
        context_used: context_used
            .map(|raw| parse_json::<Value>(4, &raw))
            .transpose()?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

fn load_session(conn: &Connection, id: SessionId) -> rusqlite::Result<Option<ConversationSession>> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1"),
        [id],
        row_to_session,
    )
    .optional()
}

fn insert_message(
    conn: &Connection,
    session_id: SessionId,
    message: &NewMessage,
    created_at: &str,
) -> SqliteResult<i64> {
    let context_used = message
        .context_used
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO chat_messages (session_id, sender, content, context_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, message.sender.as_str(), message.content, context_used, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, owner_id: UserId, title: &str) -> Result<ConversationSession> {
        let title = title.to_string();
        self.pool
            .call(move |conn| {
                let now = timestamp(Utc::now());
                conn.execute(
                    "INSERT INTO chat_sessions (owner_id, title, created_at, updated_at, last_activity)
                     VALUES (?1, ?2, ?3, ?3, ?3)",
                    params![owner_id, title, now],
                )?;
                let id = conn.last_insert_rowid();
                debug!(session_id = id, owner_id, "Created session");
                load_session(conn, id)?.ok_or_else(|| missing(id))
            })
            .await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ConversationSession>> {
        self.pool
            .call(move |conn| Ok(load_session(conn, id)?))
            .await
    }

    async fn list_sessions(&self, owner_id: UserId) -> Result<Vec<ConversationSession>> {
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM chat_sessions
                     WHERE owner_id = ?1
                     ORDER BY last_activity DESC, id DESC"
                ))?;
                let sessions = stmt
                    .query_map([owner_id], row_to_session)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(sessions)
            })
            .await
    }

    async fn rename_session(&self, id: SessionId, title: &str) -> Result<ConversationSession> {
        let title = title.to_string();
        self.pool
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE chat_sessions SET title = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, title, timestamp(Utc::now())],
                )?;
                if updated == 0 {
                    return Err(missing(id));
                }
                load_session(conn, id)?.ok_or_else(|| missing(id))
            })
            .await
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        self.pool
            .call(move |conn| {
                let tx = conn.transaction()?;
                // explicit so the cascade does not depend on the foreign_keys pragma
                tx.execute("DELETE FROM chat_messages WHERE session_id = ?1", [id])?;
                let deleted = tx.execute("DELETE FROM chat_sessions WHERE id = ?1", [id])?;
                if deleted == 0 {
                    return Err(missing(id));
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    async fn append_message(&self, session_id: SessionId, message: NewMessage) -> Result<Message> {
        self.pool
            .call(move |conn| {
                let tx = conn.transaction()?;
                if load_session(&tx, session_id)?.is_none() {
                    return Err(missing(session_id));
                }
                let now = timestamp(Utc::now());
                let id = insert_message(&tx, session_id, &message, &now)?;
                tx.execute(
                    "UPDATE chat_sessions SET last_activity = ?2 WHERE id = ?1",
                    params![session_id, now],
                )?;
                let stored = tx.query_row(
                    "SELECT id, session_id, sender, content, context_used, created_at
                     FROM chat_messages WHERE id = ?1",
                    [id],
                    row_to_message,
                )?;
                tx.commit()?;
                Ok(stored)
            })
            .await
    }

    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, sender, content, context_used, created_at
                     FROM chat_messages WHERE session_id = ?1 ORDER BY id",
                )?;
                let messages = stmt
                    .query_map([session_id], row_to_message)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(messages)
            })
            .await
    }

    async fn record_follow_up(
        &self,
        id: SessionId,
        new_node_ids: &[String],
        memory_patch: Map<String, Value>,
        turns: Vec<NewMessage>,
    ) -> Result<ConversationSession> {
        let new_node_ids = new_node_ids.to_vec();
        self.pool
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut session = load_session(&tx, id)?.ok_or_else(|| missing(id))?;
                session.apply_follow_up(&new_node_ids, &memory_patch, Utc::now());

                tx.execute(
                    "UPDATE chat_sessions
                     SET memory_context = ?2, recent_node_ids = ?3, updated_at = ?4, last_activity = ?5
                     WHERE id = ?1",
                    params![
                        id,
                        serde_json::to_string(&session.memory_context)?,
                        serde_json::to_string(&session.recent_node_ids)?,
                        timestamp(session.updated_at),
                        timestamp(session.last_activity),
                    ],
                )?;
                let created_at = timestamp(session.last_activity);
                for turn in &turns {
                    insert_message(&tx, id, turn, &created_at)?;
                }
                tx.commit()?;
                debug!(session_id = id, turns = turns.len(), "Recorded follow-up");
                Ok(session)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowflow_core::ErrorKind;
    use serde_json::json;

    fn store() -> SqliteSessionStore {
        SqliteSessionStore::new(SqlitePool::memory().unwrap())
    }

    #[tokio::test]
    async fn test_session_crud() {
        let store = store();
        let session = store.create_session(7, "Refunds").await.unwrap();
        assert_eq!(session.owner_id, 7);
        assert!(session.memory_context.is_empty());

        let renamed = store.rename_session(session.id, "Billing").await.unwrap();
        assert_eq!(renamed.title, "Billing");

        let fetched = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Billing");

        store.delete_session(session.id).await.unwrap();
        assert!(store.get_session(session.id).await.unwrap().is_none());

        let err = store.delete_session(session.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_messages_round_trip_context() {
        let store = store();
        let session = store.create_session(1, "t").await.unwrap();

        store
            .append_message(session.id, NewMessage::user("What is the refund window?"))
            .await
            .unwrap();
        store
            .append_message(
                session.id,
                NewMessage::assistant("30 days.", Some(json!({"vector_results": []}))),
            )
            .await
            .unwrap();

        let messages = store.list_messages(session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].context_used, Some(json!({"vector_results": []})));

        let err = store
            .append_message(999, NewMessage::user("orphan"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_follow_up_caps_and_dedupes_nodes() {
        let store = store();
        let session = store.create_session(1, "t").await.unwrap();

        let first: Vec<String> = (0..8).map(|i| format!("n{i}")).collect();
        store
            .record_follow_up(session.id, &first, Map::new(), Vec::new())
            .await
            .unwrap();

        let second = vec!["n9".to_string(), "n10".to_string(), "n0".to_string(), "n11".to_string()];
        let mut patch = Map::new();
        patch.insert("turn_count".to_string(), json!(2));
        let updated = store
            .record_follow_up(session.id, &second, patch, Vec::new())
            .await
            .unwrap();

        assert_eq!(updated.recent_node_ids.len(), 10);
        assert_eq!(&updated.recent_node_ids[..4], &["n9", "n10", "n0", "n11"]);
        assert_eq!(updated.memory_context["turn_count"], 2);

        let persisted = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(persisted.recent_node_ids, updated.recent_node_ids);
        assert!(persisted.last_activity >= session.last_activity);
    }

    #[tokio::test]
    async fn test_follow_up_turns_commit_with_the_session() {
        let store = store();
        let session = store.create_session(1, "t").await.unwrap();

        let turns = vec![
            NewMessage::user("And for digital goods?"),
            NewMessage::assistant("14 days.", Some(json!({"referenced_node_ids": ["refunds"]}))),
        ];
        let updated = store
            .record_follow_up(session.id, &["refunds".to_string()], Map::new(), turns)
            .await
            .unwrap();
        assert_eq!(updated.recent_node_ids, vec!["refunds"]);

        let messages = store.list_messages(session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].content, "14 days.");
        assert_eq!(
            messages[1].context_used,
            Some(json!({"referenced_node_ids": ["refunds"]}))
        );
    }

    #[tokio::test]
    async fn test_follow_up_on_missing_session_writes_no_turns() {
        let store = store();
        let err = store
            .record_follow_up(404, &[], Map::new(), vec![NewMessage::user("orphan")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let orphans: i64 = store
            .pool
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let store = store();
        store.create_session(1, "a").await.unwrap();
        store.create_session(2, "b").await.unwrap();
        let latest = store.create_session(1, "c").await.unwrap();

        let sessions = store.list_sessions(1).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, latest.id);
    }
}
