//! # Knowflow LLM
//!
//! HTTP implementations of the [`knowflow_core::LanguageModel`] and
//! [`knowflow_core::EmbeddingModel`] traits, plus factories that build them from
//! [`knowflow_config`] sections.
//!
//! - [`chat`]: OpenAI-compatible `/chat/completions` and Ollama `/api/chat`
//! - [`embeddings`]: OpenAI-compatible `/embeddings` and Ollama `/api/embed`

pub mod chat;
pub mod embeddings;
mod http;

pub use chat::{create_language_model, OllamaChatModel, OpenAIChatModel};
pub use embeddings::{create_embedding_model, OllamaEmbeddingModel, OpenAIEmbeddingModel};
