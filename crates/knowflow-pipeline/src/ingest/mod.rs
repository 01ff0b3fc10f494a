//! Document upload and indexing
//!
//! Upload stores the original bytes and leaves the document `processing`. Indexing loads
//! them back, extracts the knowledge graph, then chunks, embeds and stores the text.
//! A failed graph write is logged and indexing continues; any other failure marks the
//! document `failed` with the error message.

mod chunker;

pub use chunker::TextChunker;

use knowflow_config::IngestionConfig;
use knowflow_core::types::{new_document_id, ChunkMetadata};
use knowflow_core::{
    BlobStorage, Document, DocumentChunk, DocumentStatus, DocumentStore, EmbeddingModel,
    KnowflowError, LanguageModel, Result, StoreReport, UserId, VectorEntry, VectorStore,
};
use knowflow_graph::{GraphExtractor, KnowledgeGraphStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::keyed_lock::KeyedLocks;

/// Loader selected by content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    PlainText,
    Markdown,
}

impl ContentKind {
    /// Parameters such as `; charset=utf-8` are ignored
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Ok(ContentKind::PlainText),
            "text/markdown" | "text/x-markdown" => Ok(ContentKind::Markdown),
            _ => Err(KnowflowError::validation(format!(
                "Unsupported file type: {mime}"
            ))),
        }
    }

    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" | "text" => Some(ContentKind::PlainText),
            "md" | "markdown" => Some(ContentKind::Markdown),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ContentKind::PlainText => "text/plain",
            ContentKind::Markdown => "text/markdown",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContentKind::PlainText => ".txt",
            ContentKind::Markdown => ".md",
        }
    }

    /// UTF-8 text of an upload; markdown is indexed as-is
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| KnowflowError::validation(format!("document is not valid UTF-8: {e}")))?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}

/// Blob key for an upload: `user_{owner}/documents/{doc_id}{ext}`
pub fn blob_key(owner: UserId, doc_id: &str, kind: ContentKind) -> String {
    format!("user_{owner}/documents/{doc_id}{}", kind.extension())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestorConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extract_graph: bool,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            extract_graph: true,
        }
    }
}

impl From<&IngestionConfig> for IngestorConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size(),
            chunk_overlap: config.chunk_overlap(),
            extract_graph: config.extract_graph,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub doc_id: String,
    pub status: DocumentStatus,
    pub chunks: usize,
    /// `None` when extraction found nothing or the graph write failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<StoreReport>,
    pub already_indexed: bool,
}

pub struct DocumentIngestor {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStorage>,
    embedder: Arc<dyn EmbeddingModel>,
    vectors: Arc<dyn VectorStore>,
    extractor: GraphExtractor,
    graph: Arc<KnowledgeGraphStore>,
    chunker: TextChunker,
    extract_graph: bool,
    locks: KeyedLocks<String>,
}

impl DocumentIngestor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStorage>,
        embedder: Arc<dyn EmbeddingModel>,
        vectors: Arc<dyn VectorStore>,
        graph: Arc<KnowledgeGraphStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            documents,
            blobs,
            embedder,
            vectors,
            extractor: GraphExtractor::new(llm),
            graph,
            chunker: TextChunker::default(),
            extract_graph: true,
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_config(mut self, config: IngestorConfig) -> Self {
        self.chunker = TextChunker::new(config.chunk_size, config.chunk_overlap);
        self.extract_graph = config.extract_graph;
        self
    }

    /// Store an upload and register it as `processing`
    pub async fn upload(
        &self,
        owner: UserId,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Document> {
        let kind = ContentKind::from_mime(content_type)?;
        if bytes.is_empty() {
            return Err(KnowflowError::validation("document is empty"));
        }

        let doc_id = new_document_id();
        let key = blob_key(owner, &doc_id, kind);
        let mut document = Document::new(doc_id.as_str(), owner, filename, kind.mime());
        document
            .metadata
            .insert("original_filename".to_string(), Value::from(filename));
        document
            .metadata
            .insert("blob_key".to_string(), Value::from(key.as_str()));
        self.documents.insert_document(document).await?;

        let size = bytes.len();
        if let Err(err) = self.blobs.put(&key, bytes, kind.mime()).await {
            error!(doc_id = %doc_id, backend = self.blobs.name(), error = %err, "Failed to store upload");
            self.documents
                .update_status(&doc_id, DocumentStatus::Failed, Some(err.to_string()))
                .await?;
            return Err(err);
        }

        let document = self
            .documents
            .update_status(&doc_id, DocumentStatus::Processing, None)
            .await?;
        info!(doc_id = %doc_id, owner_id = owner, bytes = size, "Uploaded document");
        Ok(document)
    }

    /// Index an uploaded document; a no-op for indexed documents unless `force`
    pub async fn index(&self, owner: UserId, doc_id: &str, force: bool) -> Result<IndexReport> {
        let _held = self.locks.lock(doc_id.to_string()).await;

        let document = self
            .documents
            .get_document(doc_id)
            .await?
            .ok_or_else(|| KnowflowError::not_found(format!("document {doc_id}")))?;
        if document.owner_id != owner {
            warn!(doc_id, user_id = owner, "Rejected access to another user's document");
            return Err(KnowflowError::unauthorized("access denied to this document"));
        }

        if document.status == DocumentStatus::Indexed && !force {
            debug!(doc_id, "Document already indexed");
            return Ok(IndexReport {
                doc_id: doc_id.to_string(),
                status: DocumentStatus::Indexed,
                chunks: 0,
                graph: None,
                already_indexed: true,
            });
        }

        self.documents
            .update_status(doc_id, DocumentStatus::Processing, None)
            .await?;

        match self.index_content(&document).await {
            Ok((chunks, graph)) => {
                self.documents
                    .update_status(doc_id, DocumentStatus::Indexed, None)
                    .await?;
                info!(doc_id, chunks, "Indexed document");
                Ok(IndexReport {
                    doc_id: doc_id.to_string(),
                    status: DocumentStatus::Indexed,
                    chunks,
                    graph,
                    already_indexed: false,
                })
            }
            Err(err) => {
                error!(doc_id, error = %err, "Indexing failed");
                if let Err(status_err) = self
                    .documents
                    .update_status(doc_id, DocumentStatus::Failed, Some(err.to_string()))
                    .await
                {
                    warn!(doc_id, error = %status_err, "Could not mark document as failed");
                }
                Err(err)
            }
        }
    }

    /// Upload then index in one call
    pub async fn ingest(
        &self,
        owner: UserId,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<IndexReport> {
        let document = self.upload(owner, filename, content_type, bytes).await?;
        self.index(owner, &document.doc_id, false).await
    }

    async fn index_content(&self, document: &Document) -> Result<(usize, Option<StoreReport>)> {
        let kind = ContentKind::from_mime(&document.content_type)?;
        let key = document
            .blob_key()
            .map(str::to_string)
            .unwrap_or_else(|| blob_key(document.owner_id, &document.doc_id, kind));
        let bytes = self.blobs.get(&key).await?;
        let text = kind.decode(&bytes)?;

        let graph = if self.extract_graph {
            self.store_graph(&document.doc_id, &text).await?
        } else {
            None
        };

        let chunks = self.chunker.split(&text);
        let removed = self.vectors.delete_document(&document.doc_id).await?;
        if removed > 0 {
            debug!(doc_id = %document.doc_id, removed, "Removed previous vector entries");
        }

        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&chunks).await?
        };
        if embeddings.len() != chunks.len() {
            return Err(KnowflowError::external(
                self.embedder.name(),
                format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
            ));
        }

        let entries: Vec<VectorEntry> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| VectorEntry {
                text: text.clone(),
                embedding,
                metadata: ChunkMetadata {
                    doc_id: document.doc_id.clone(),
                    owner_id: document.owner_id,
                    chunk_index,
                },
            })
            .collect();
        if !entries.is_empty() {
            self.vectors.add(entries).await?;
        }

        let rows: Vec<DocumentChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| {
                let mut metadata = serde_json::Map::new();
                metadata.insert("index".to_string(), Value::from(chunk_index));
                DocumentChunk {
                    doc_id: document.doc_id.clone(),
                    chunk_index,
                    content,
                    metadata,
                }
            })
            .collect();
        let count = self.documents.replace_chunks(&document.doc_id, rows).await?;
        Ok((count, graph))
    }

    async fn store_graph(&self, doc_id: &str, text: &str) -> Result<Option<StoreReport>> {
        let knowledge = self.extractor.extract(text).await?;
        if knowledge.is_empty() {
            debug!(doc_id, "No graph knowledge extracted");
            return Ok(None);
        }

        match self.graph.store(doc_id, &knowledge).await {
            Ok(report) => Ok(Some(report)),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                error!(doc_id, error = %err, "Failed to store graph knowledge, continuing");
                Ok(None)
            }
        }
    }

    /// Documents with an index run in flight
    pub fn active_document_locks(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_dispatch() {
        assert_eq!(
            ContentKind::from_mime("text/plain; charset=utf-8").unwrap(),
            ContentKind::PlainText
        );
        assert_eq!(
            ContentKind::from_mime("Text/Markdown").unwrap(),
            ContentKind::Markdown
        );
        let err = ContentKind::from_mime("application/pdf").unwrap_err();
        assert!(matches!(err, KnowflowError::Validation(_)));
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            ContentKind::from_path(Path::new("notes/README.MD")),
            Some(ContentKind::Markdown)
        );
        assert_eq!(ContentKind::from_path(Path::new("a.pdf")), None);
        assert_eq!(ContentKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_blob_key_layout() {
        assert_eq!(
            blob_key(7, "abc", ContentKind::Markdown),
            "user_7/documents/abc.md"
        );
    }

    #[test]
    fn test_decode_strips_bom_and_rejects_binary() {
        assert_eq!(
            ContentKind::PlainText.decode("\u{feff}hello".as_bytes()).unwrap(),
            "hello"
        );
        assert!(ContentKind::PlainText.decode(&[0xff, 0xfe, 0x00]).is_err());
    }
}
