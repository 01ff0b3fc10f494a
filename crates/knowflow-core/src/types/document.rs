//! Ingested documents and their chunks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use super::query::UserId;

/// Fresh document identifier
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Indexed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DocumentStatus::Pending),
            "processing" => Some(DocumentStatus::Processing),
            "indexed" => Some(DocumentStatus::Indexed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub owner_id: UserId,
    pub title: String,
    pub content_type: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(
        doc_id: impl Into<String>,
        owner_id: UserId,
        title: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            doc_id: doc_id.into(),
            owner_id,
            title: title.into(),
            content_type: content_type.into(),
            status: DocumentStatus::Pending,
            error_message: None,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
            indexed_at: None,
        }
    }

    /// Blob key holding the original upload
    pub fn blob_key(&self) -> Option<&str> {
        self.metadata.get("blob_key").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub doc_id: String,
    pub chunk_index: usize,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Owner-scoped document listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub owner_id: UserId,
    pub status: Option<DocumentStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl DocumentQuery {
    pub fn owner(owner_id: UserId) -> Self {
        Self {
            owner_id,
            status: None,
            limit: 50,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
