//! DocumentStore implementation for SQLite

use crate::connection::SqlitePool;
use crate::error::SqliteError;
use crate::row::{parse_json, parse_timestamp, timestamp};
use async_trait::async_trait;
use chrono::Utc;
use knowflow_core::{Document, DocumentChunk, DocumentQuery, DocumentStatus, DocumentStore, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const DOCUMENT_COLUMNS: &str = "doc_id, owner_id, title, content_type, status, error_message, \
     metadata, created_at, updated_at, indexed_at";

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn missing(doc_id: &str) -> SqliteError {
    SqliteError::NotFound(format!("document {doc_id}"))
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let status: String = row.get(4)?;
    let metadata: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let indexed_at: Option<String> = row.get(9)?;

    Ok(Document {
        doc_id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        content_type: row.get(3)?,
        status: DocumentStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown status {status}").into(),
            )
        })?,
        error_message: row.get(5)?,
        metadata: parse_json(6, &metadata)?,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
        indexed_at: indexed_at
            .map(|raw| parse_timestamp(9, &raw))
            .transpose()?,
    })
}

fn load_document(conn: &Connection, doc_id: &str) -> rusqlite::Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE doc_id = ?1"),
        [doc_id],
        row_to_document,
    )
    .optional()
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_document(&self, document: Document) -> Result<Document> {
        self.pool
            .call(move |conn| {
                if load_document(conn, &document.doc_id)?.is_some() {
                    return Err(SqliteError::InvalidOperation(format!(
                        "document {} already exists",
                        document.doc_id
                    )));
                }
                conn.execute(
                    &format!(
                        "INSERT INTO documents ({DOCUMENT_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                    ),
                    params![
                        document.doc_id,
                        document.owner_id,
                        document.title,
                        document.content_type,
                        document.status.as_str(),
                        document.error_message,
                        serde_json::to_string(&document.metadata)?,
                        timestamp(document.created_at),
                        timestamp(document.updated_at),
                        document.indexed_at.map(timestamp),
                    ],
                )?;
                load_document(conn, &document.doc_id)?.ok_or_else(|| missing(&document.doc_id))
            })
            .await
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        let doc_id = doc_id.to_string();
        self.pool
            .call(move |conn| Ok(load_document(conn, &doc_id)?))
            .await
    }

    async fn update_status(
        &self,
        doc_id: &str,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document> {
        let doc_id = doc_id.to_string();
        self.pool
            .call(move |conn| {
                let now = timestamp(Utc::now());
                let indexed_at = (status == DocumentStatus::Indexed).then(|| now.clone());
                let updated = conn.execute(
                    "UPDATE documents
                     SET status = ?2, error_message = ?3, updated_at = ?4,
                         indexed_at = COALESCE(?5, indexed_at)
                     WHERE doc_id = ?1",
                    params![doc_id, status.as_str(), error_message, now, indexed_at],
                )?;
                if updated == 0 {
                    return Err(missing(&doc_id));
                }
                load_document(conn, &doc_id)?.ok_or_else(|| missing(&doc_id))
            })
            .await
    }

    async fn list_documents(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents
                     WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
                     ORDER BY created_at DESC, doc_id
                     LIMIT ?3 OFFSET ?4"
                ))?;
                let documents = stmt
                    .query_map(
                        params![
                            query.owner_id,
                            query.status.map(|s| s.as_str()),
                            query.limit as i64,
                            query.offset as i64,
                        ],
                        row_to_document,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(documents)
            })
            .await
    }

    async fn replace_chunks(&self, doc_id: &str, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let doc_id = doc_id.to_string();
        self.pool
            .call(move |conn| {
                let tx = conn.transaction()?;
                if load_document(&tx, &doc_id)?.is_none() {
                    return Err(missing(&doc_id));
                }
                tx.execute("DELETE FROM document_chunks WHERE doc_id = ?1", [&doc_id])?;
                {
                    let mut insert = tx.prepare(
                        "INSERT INTO document_chunks (doc_id, chunk_index, content, metadata)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for chunk in &chunks {
                        insert.execute(params![
                            doc_id,
                            chunk.chunk_index as i64,
                            chunk.content,
                            serde_json::to_string(&chunk.metadata)?,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(chunks.len())
            })
            .await
    }

    async fn list_chunks(&self, doc_id: &str) -> Result<Vec<DocumentChunk>> {
        let doc_id = doc_id.to_string();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT doc_id, chunk_index, content, metadata
                     FROM document_chunks WHERE doc_id = ?1 ORDER BY chunk_index",
                )?;
                let chunks = stmt
                    .query_map([&doc_id], |row| {
                        let chunk_index: i64 = row.get(1)?;
                        let metadata: String = row.get(3)?;
                        Ok(DocumentChunk {
                            doc_id: row.get(0)?,
                            chunk_index: chunk_index as usize,
                            content: row.get(2)?,
                            metadata: parse_json(3, &metadata)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(chunks)
            })
            .await
    }
}
