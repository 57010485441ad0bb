//! Error taxonomy shared by every provider call.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Transport failure, connect error or timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered 429 or a local rate window / quota rejected the call.
    #[error("Rate limited by {provider}: {reason}")]
    RateLimit { provider: String, reason: String },

    /// Missing or rejected credentials.
    #[error("Authentication failed for {provider}: {reason}")]
    Auth { provider: String, reason: String },

    /// Non-2xx status or malformed payload.
    #[error("Provider {provider} error{}: {message}", status_suffix(.status))]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Persistent cache store I/O or codec failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid settings, raised while building the gateway or its HTTP
    /// client. A disabled fallback at call time is not reported here: the
    /// primary error is returned unchanged.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller supplied arguments that no provider can serve.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Both the primary and the fallback tier failed.
    #[error("All providers failed for {op}: primary: {primary}; fallback: {fallback}")]
    Exhausted {
        op: String,
        primary: Box<GeoError>,
        fallback: Box<GeoError>,
    },
}

/// Result type for gateway operations.
pub type GeoResult<T> = Result<T, GeoError>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GeoError {
    pub fn timeout(op: &str, after: Duration) -> Self {
        GeoError::Network(format!("{op} timed out after {}ms", after.as_millis()))
    }

    pub fn offline(op: &str) -> Self {
        GeoError::Network(format!("device offline and no cached result for {op}"))
    }

    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        GeoError::Provider {
            provider: provider.to_string(),
            status: None,
            message: message.into(),
        }
    }

    /// Whether the fallback tier may be attempted after this error.
    ///
    /// Auth failures escalate too: the fallback is a different provider with
    /// its own credentials.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GeoError::Network(_)
                | GeoError::RateLimit { .. }
                | GeoError::Auth { .. }
                | GeoError::Provider { .. }
        )
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GeoError::Network(_) => "network",
            GeoError::RateLimit { .. } => "rate_limit",
            GeoError::Auth { .. } => "auth",
            GeoError::Provider { .. } => "provider",
            GeoError::Cache(_) => "cache",
            GeoError::Configuration(_) => "configuration",
            GeoError::InvalidRequest(_) => "invalid_request",
            GeoError::Exhausted { .. } => "exhausted",
        }
    }
}

impl From<reqwest::Error> for GeoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            let provider = err
                .url()
                .and_then(|u| u.host_str())
                .unwrap_or("unknown")
                .to_string();
            GeoError::Provider {
                provider,
                status: None,
                message: format!("malformed response: {err}"),
            }
        } else {
            GeoError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(GeoError::Network("reset".into()).is_recoverable());
        assert!(GeoError::Auth {
            provider: "ors".into(),
            reason: "401".into()
        }
        .is_recoverable());
        assert!(!GeoError::Configuration("no tier".into()).is_recoverable());
        assert!(!GeoError::InvalidRequest("zoom".into()).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = GeoError::Provider {
            provider: "nominatim".into(),
            status: Some(503),
            message: "Service Unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "Provider nominatim error (HTTP 503): Service Unavailable"
        );

        let err = GeoError::Exhausted {
            op: "route".into(),
            primary: Box::new(GeoError::Network("connection refused".into())),
            fallback: Box::new(GeoError::provider("osrm", "NoRoute")),
        };
        let msg = err.to_string();
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("NoRoute"));
        assert_eq!(err.kind(), "exhausted");
    }

    #[test]
    fn test_timeout_message() {
        let err = GeoError::timeout("geocode", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Network error: geocode timed out after 1500ms");
    }
}
