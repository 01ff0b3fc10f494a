use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Local persistence locations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: Option<PathBuf>,
    /// Root directory for uploaded originals
    pub blob_root: Option<PathBuf>,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("knowflow")
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("knowflow.db"))
    }

    pub fn blob_root(&self) -> PathBuf {
        self.blob_root
            .clone()
            .unwrap_or_else(|| data_dir().join("blobs"))
    }
}
