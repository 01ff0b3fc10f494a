//! SQLite storage backend for Knowflow
//!
//! One database file holds chat sessions, chat messages, documents, document chunks and
//! the embedded chunks used for similarity search.
//!
//! - **WAL Mode**: concurrent readers alongside the single writer
//! - **Thread Safety**: `Arc<Mutex<Connection>>` shared by every store
//! - **Async**: every call runs on tokio's blocking pool
//!
//! ## Usage
//!
//! ```rust,no_run
//! use knowflow_core::SessionStore;
//! use knowflow_sqlite::{SqliteConfig, SqlitePool, SqliteSessionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = SqlitePool::new(SqliteConfig::new("./knowflow.db"))?;
//! let sessions = SqliteSessionStore::new(pool.clone());
//! let session = sessions.create_session(1, "Onboarding").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod document_store;
pub mod error;
mod row;
pub mod schema;
pub mod session_store;
pub mod vector_store;

pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use document_store::SqliteDocumentStore;
pub use error::{SqliteError, SqliteResult};
pub use session_store::SqliteSessionStore;
pub use vector_store::SqliteVectorStore;
