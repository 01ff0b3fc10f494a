//! Error taxonomy shared by every Knowflow crate
//!
//! Four failure kinds are visible to callers:
//!
//! - **Validation**: malformed caller input
//! - **ExternalService**: a downstream model or store failed (carries the backend name)
//! - **NotFound**: a session or document does not exist
//! - **Authorization**: the current user does not own the resource
//!
//! Timeouts are external-service failures with their own variant so the pipeline can
//! tell them apart, and cancellation is reported separately because it is not a fault.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, KnowflowError>;

/// Errors surfaced by the retrieval pipeline and its collaborators
#[derive(Debug, Clone, thiserror::Error)]
pub enum KnowflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{service} failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("{service} timed out after {}s", after.as_secs())]
    Timeout { service: String, after: Duration },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Authorization(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Stable, machine-readable failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailure,
    ExternalServiceFailure,
    NotFound,
    AuthorizationFailure,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::ExternalServiceFailure => "external_service_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AuthorizationFailure => "authorization_failure",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// User-facing error body
///
/// `error` is an opaque diagnostic for operators and is only populated for
/// external-service failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KnowflowError {
    /// Wrap a downstream failure, tagging it with the backend name
    pub fn external(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        KnowflowError::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        KnowflowError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        KnowflowError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        KnowflowError::Authorization(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            KnowflowError::Validation(_) => ErrorKind::ValidationFailure,
            KnowflowError::ExternalService { .. } | KnowflowError::Timeout { .. } => {
                ErrorKind::ExternalServiceFailure
            }
            KnowflowError::NotFound(_) => ErrorKind::NotFound,
            KnowflowError::Authorization(_) => ErrorKind::AuthorizationFailure,
            KnowflowError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, KnowflowError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, KnowflowError::Cancelled)
    }

    /// Name of the backend that failed, if this is an external failure
    pub fn service(&self) -> Option<&str> {
        match self {
            KnowflowError::ExternalService { service, .. } | KnowflowError::Timeout { service, .. } => {
                Some(service)
            }
            _ => None,
        }
    }

    /// Re-tag a failure with the backend that observed it, keeping other kinds intact
    pub fn tagged(self, service: &str) -> Self {
        match self {
            KnowflowError::ExternalService { message, service: inner } if inner != service => {
                KnowflowError::ExternalService {
                    service: service.to_string(),
                    message: format!("{inner}: {message}"),
                }
            }
            other => other,
        }
    }

    /// Render the error for the user-facing payload
    pub fn payload(&self) -> ErrorPayload {
        let (message, error) = match self {
            KnowflowError::ExternalService { service, message } => (
                format!("The {service} service failed to complete the request"),
                Some(message.clone()),
            ),
            KnowflowError::Timeout { service, after } => (
                format!("The {service} service did not respond in time"),
                Some(format!("timed out after {}s", after.as_secs())),
            ),
            other => (other.to_string(), None),
        };

        ErrorPayload {
            kind: self.kind(),
            message,
            error,
        }
    }
}

impl From<serde_json::Error> for KnowflowError {
    fn from(err: serde_json::Error) -> Self {
        KnowflowError::external("serialization", err)
    }
}
