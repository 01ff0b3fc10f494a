//! VectorStore implementation for SQLite
//!
//! Embeddings are stored as JSON arrays and scored with brute-force cosine similarity
//! over the owner's rows.

use crate::connection::SqlitePool;
use crate::row::parse_json;
use async_trait::async_trait;
use knowflow_core::types::ChunkMetadata;
use knowflow_core::vector_math::cosine_similarity;
use knowflow_core::{Result, ScoredChunk, SearchFilter, VectorEntry, VectorStore};
use rusqlite::params;
use tracing::debug;

#[derive(Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &str {
        "SqliteVectorStore"
    }

    async fn add(&self, entries: Vec<VectorEntry>) -> Result<usize> {
        self.pool
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut insert = tx.prepare(
                        "INSERT INTO vector_chunks (doc_id, owner_id, chunk_index, text, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for entry in &entries {
                        insert.execute(params![
                            entry.metadata.doc_id,
                            entry.metadata.owner_id,
                            entry.metadata.chunk_index as i64,
                            entry.text,
                            serde_json::to_string(&entry.embedding)?,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
    }

    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding = embedding.to_vec();
        let filter = filter.clone();
        self.pool
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT doc_id, owner_id, chunk_index, text, embedding
                     FROM vector_chunks WHERE owner_id = ?1",
                )?;
                let rows = stmt.query_map([filter.owner_id], |row| {
                    let chunk_index: i64 = row.get(2)?;
                    let stored: String = row.get(4)?;
                    let vector: Vec<f32> = parse_json(4, &stored)?;
                    Ok(ScoredChunk {
                        metadata: ChunkMetadata {
                            doc_id: row.get(0)?,
                            owner_id: row.get(1)?,
                            chunk_index: chunk_index as usize,
                        },
                        text: row.get(3)?,
                        score: cosine_similarity(&embedding, &vector),
                    })
                })?;

                let mut hits = Vec::new();
                for hit in rows {
                    let hit = hit?;
                    if filter.matches(hit.metadata.owner_id, &hit.metadata.doc_id) {
                        hits.push(hit);
                    }
                }
                hits.sort_by(|a, b| b.score.total_cmp(&a.score));
                hits.truncate(k);
                debug!(owner_id = filter.owner_id, hits = hits.len(), "Vector search");
                Ok(hits)
            })
            .await
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let doc_id = doc_id.to_string();
        self.pool
            .call(move |conn| Ok(conn.execute("DELETE FROM vector_chunks WHERE doc_id = ?1", [&doc_id])?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(doc_id: &str, owner_id: i64, index: usize, text: &str, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            text: text.to_string(),
            embedding,
            metadata: ChunkMetadata {
                doc_id: doc_id.to_string(),
                owner_id,
                chunk_index: index,
            },
        }
    }

    #[tokio::test]
    async fn test_search_ranks_and_scopes() {
        let store = SqliteVectorStore::new(SqlitePool::memory().unwrap());
        store
            .add(vec![
                entry("d1", 1, 0, "refunds within 30 days", vec![1.0, 0.0]),
                entry("d1", 1, 1, "shipping is free", vec![0.0, 1.0]),
                entry("d2", 1, 0, "refund exceptions", vec![0.9, 0.1]),
                entry("d3", 2, 0, "other tenant refunds", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2, &SearchFilter::owner(1)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "refunds within 30 days");
        assert_eq!(hits[1].text, "refund exceptions");
        assert!(hits[0].score >= hits[1].score);

        let scoped = SearchFilter::owner(1).with_documents(Some(vec!["d2".to_string()]));
        let hits = store.search(&[1.0, 0.0], 3, &scoped).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.doc_id, "d2");
    }

    #[tokio::test]
    async fn test_delete_document() {
        let store = SqliteVectorStore::new(SqlitePool::memory().unwrap());
        store
            .add(vec![
                entry("d1", 1, 0, "a", vec![1.0]),
                entry("d1", 1, 1, "b", vec![1.0]),
                entry("d2", 1, 0, "c", vec![1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_document("d1").await.unwrap(), 2);
        let hits = store.search(&[1.0], 10, &SearchFilter::owner(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
