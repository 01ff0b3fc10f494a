//! Language model contract
//!
//! The pipeline only needs a prompt-to-completion mapping: a system prompt that fixes the
//! task and a user prompt that carries the data. Streaming, tool calls and sampling knobs
//! belong to the implementations.

use async_trait::async_trait;

use crate::error::Result;

/// A text completion backend
///
/// Implementations must report failures as [`KnowflowError::ExternalService`] tagged with
/// [`LanguageModel::name`], never as backend-specific errors.
///
/// [`KnowflowError::ExternalService`]: crate::error::KnowflowError::ExternalService
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name used to tag failures and logs
    fn name(&self) -> &str;

    /// Complete a single exchange
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
