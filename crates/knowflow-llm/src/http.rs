//! Shared request plumbing for the HTTP clients

use knowflow_core::{KnowflowError, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// POST a JSON body and decode a JSON response
///
/// Transport timeouts become [`KnowflowError::Timeout`]; every other failure is an
/// external-service error tagged with `service`.
pub(crate) async fn post_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    service: &str,
    timeout: Duration,
) -> Result<T> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(service, timeout, e))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(KnowflowError::external(
            service,
            format!("API error ({}): {}", status, error_text),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| KnowflowError::external(service, format!("Failed to parse response: {}", e)))
}

fn transport_error(service: &str, after: Duration, err: reqwest::Error) -> KnowflowError {
    if err.is_timeout() {
        KnowflowError::Timeout {
            service: service.to_string(),
            after,
        }
    } else {
        KnowflowError::external(service, format!("HTTP request failed: {}", err))
    }
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("http://localhost:11434/", "/api/chat"),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(
            endpoint("https://api.openai.com/v1", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
