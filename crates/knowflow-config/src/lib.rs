//! # Knowflow Configuration
//!
//! Typed configuration for the retrieval pipeline and its adapters, loaded from TOML and
//! overridden from the environment.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use knowflow_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load(None).await?;
//!     println!("top_k = {}", config.retrieval.top_k());
//!     Ok(())
//! }
//! ```

pub mod components;
mod config;
mod loader;

pub use components::*;
pub use config::*;
pub use loader::*;
