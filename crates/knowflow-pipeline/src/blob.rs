//! Filesystem [`BlobStorage`]
//!
//! Blobs live under a root directory at their key. The content type is kept in a
//! `<file>.content-type` sidecar next to each blob.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use knowflow_core::{BlobMetadata, BlobStorage, KnowflowError, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const SIDECAR_SUFFIX: &str = ".content-type";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct FsBlobStorage {
    root: PathBuf,
}

impl FsBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are relative `/`-separated paths without `..`
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with(SIDECAR_SUFFIX)
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(KnowflowError::validation(format!("invalid blob key '{key}'")));
        }
        Ok(self.root.join(relative))
    }

    fn io_error(&self, key: &str, err: std::io::Error) -> KnowflowError {
        if err.kind() == ErrorKind::NotFound {
            KnowflowError::not_found(format!("blob {key}"))
        } else {
            KnowflowError::external(self.name(), format!("{key}: {err}"))
        }
    }
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl BlobStorage for FsBlobStorage {
    fn name(&self) -> &str {
        "FsBlobStorage"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(key, e))?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| self.io_error(key, e))?;
        tokio::fs::write(sidecar(&path), content_type)
            .await
            .map_err(|e| self.io_error(key, e))?;
        debug!(key, size, "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| self.io_error(key, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobMetadata>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(self.io_error(prefix, err)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| self.io_error(prefix, e))?
            {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| self.io_error(prefix, e))?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.ends_with(SIDECAR_SUFFIX) || !key.starts_with(prefix) {
                    continue;
                }

                let content_type = tokio::fs::read_to_string(sidecar(&path))
                    .await
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string());
                let last_modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                found.push(BlobMetadata {
                    key,
                    size: metadata.len(),
                    content_type,
                    last_modified,
                });
            }
        }

        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }
}
