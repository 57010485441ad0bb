//! Deadline enforcement for provider calls.
//!
//! Every tier of a coordinated call runs under [`with_timeout`]. An elapsed
//! deadline drops the in-flight future and surfaces as a `Network` error so
//! it escalates like any other transport failure.

use std::future::Future;
use std::time::Duration;

use crate::error::{GeoError, GeoResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn with_timeout<T, F>(op: &str, after: Duration, fut: F) -> GeoResult<T>
where
    F: Future<Output = GeoResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(op, timeout_ms = after.as_millis() as u64, "Provider call timed out");
            Err(GeoError::timeout(op, after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_is_network_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, GeoError>(1)
        };
        let err = with_timeout("route", Duration::from_secs(10), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::Network(_)));
        assert!(err.to_string().contains("timed out after 10000ms"));
    }

    #[tokio::test]
    async fn test_passes_through() {
        let ok = with_timeout("tile", DEFAULT_TIMEOUT, async { Ok::<_, GeoError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout("tile", DEFAULT_TIMEOUT, async {
            Err::<u8, _>(GeoError::InvalidRequest("bad".into()))
        })
        .await;
        assert!(matches!(err, Err(GeoError::InvalidRequest(_))));
    }
}
