//! Two-tier execution: one primary attempt, at most one fallback attempt.
//!
//! # State Transitions
//! ```text
//! primary ok                   → record primary_<op> success, return
//! primary err, no fallback     → record primary_<op> failure, return primary error
//! primary err, not recoverable → record primary_<op> failure, return primary error
//! primary err, fallback ok     → record both, return fallback value
//! primary err, fallback err    → record both, return Exhausted { primary, fallback }
//! ```

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{GeoError, GeoResult};
use crate::health::ServiceHealthRegistry;
use crate::resilience::timeouts::{with_timeout, DEFAULT_TIMEOUT};

pub fn primary_key(op_id: &str) -> String {
    format!("primary_{op_id}")
}

pub fn fallback_key(op_id: &str) -> String {
    format!("fallback_{op_id}")
}

#[derive(Debug, Clone)]
pub struct FallbackCoordinator {
    health: Arc<ServiceHealthRegistry>,
    timeout: Duration,
}

impl FallbackCoordinator {
    pub fn new(health: Arc<ServiceHealthRegistry>) -> Self {
        Self::with_timeout(health, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(health: Arc<ServiceHealthRegistry>, timeout: Duration) -> Self {
        Self { health, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn health(&self) -> &Arc<ServiceHealthRegistry> {
        &self.health
    }

    pub async fn execute<'a, T, P>(
        &self,
        op_id: &str,
        primary: P,
        fallback: Option<BoxFuture<'a, GeoResult<T>>>,
    ) -> GeoResult<T>
    where
        P: Future<Output = GeoResult<T>>,
    {
        self.execute_with_timeout(op_id, primary, fallback, self.timeout)
            .await
    }

    pub async fn execute_with_timeout<'a, T, P>(
        &self,
        op_id: &str,
        primary: P,
        fallback: Option<BoxFuture<'a, GeoResult<T>>>,
        timeout: Duration,
    ) -> GeoResult<T>
    where
        P: Future<Output = GeoResult<T>>,
    {
        let primary_name = primary_key(op_id);
        let primary_err = match self.attempt(&primary_name, primary, timeout).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let Some(fallback) = fallback else {
            return Err(primary_err);
        };
        if !primary_err.is_recoverable() {
            tracing::debug!(op = op_id, error = %primary_err, "Primary error is not recoverable, skipping fallback");
            return Err(primary_err);
        }

        tracing::info!(op = op_id, error = %primary_err, "Primary failed, trying fallback");
        let fallback_name = fallback_key(op_id);
        match self.attempt(&fallback_name, fallback, timeout).await {
            Ok(value) => Ok(value),
            Err(fallback_err) => {
                tracing::error!(
                    op = op_id,
                    primary = %primary_err,
                    fallback = %fallback_err,
                    "All providers failed"
                );
                Err(GeoError::Exhausted {
                    op: op_id.to_string(),
                    primary: Box::new(primary_err),
                    fallback: Box::new(fallback_err),
                })
            }
        }
    }

    async fn attempt<T, F>(&self, name: &str, fut: F, timeout: Duration) -> GeoResult<T>
    where
        F: Future<Output = GeoResult<T>>,
    {
        let start = Instant::now();
        match with_timeout(name, timeout, fut).await {
            Ok(value) => {
                self.health.record_success(name, start.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.health.record_failure(name, &e.to_string());
                Err(e)
            }
        }
    }
}
