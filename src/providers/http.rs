//! Shared HTTP plumbing for provider adapters.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{GeoError, GeoResult};

const MAX_ERROR_BODY: usize = 200;

/// One client for every provider. Per-request deadlines come from the
/// fallback coordinator, so only the connect timeout is set here.
pub fn build_client(config: &ClientConfig) -> GeoResult<Client> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .build()
        .map_err(|e| GeoError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a non-2xx response into the matching error kind.
pub async fn check_status(provider: &str, response: Response) -> GeoResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = snippet(&body);
    tracing::warn!(provider, status = status.as_u16(), body = %detail, "Provider returned error status");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GeoError::Auth {
            provider: provider.to_string(),
            reason: format!("HTTP {}: {detail}", status.as_u16()),
        },
        StatusCode::TOO_MANY_REQUESTS => GeoError::RateLimit {
            provider: provider.to_string(),
            reason: format!("HTTP 429: {detail}"),
        },
        _ => GeoError::Provider {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message: if detail.is_empty() {
                status.canonical_reason().unwrap_or("unexpected status").to_string()
            } else {
                detail
            },
        },
    })
}

/// Status check then JSON decode. Malformed bodies become `Provider` errors.
pub async fn read_json<T: DeserializeOwned>(provider: &str, response: Response) -> GeoResult<T> {
    let response = check_status(provider, response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| GeoError::provider(provider, format!("malformed response: {e}")))
}

pub async fn read_bytes(provider: &str, response: Response) -> GeoResult<Vec<u8>> {
    let response = check_status(provider, response).await?;
    Ok(response.bytes().await?.to_vec())
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("  short  "), "short");
        let long = "é".repeat(MAX_ERROR_BODY + 10);
        let cut = snippet(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY + 3);
    }
}
