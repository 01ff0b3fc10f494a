use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

/// Object storage for uploaded originals
#[async_trait]
pub trait BlobStorage: Send + Sync {
    fn name(&self) -> &str;

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch an object; a missing key is `NotFound`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMetadata>>;
}
