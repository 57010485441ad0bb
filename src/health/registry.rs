//! Process-scoped registry of provider health.
//!
//! # Responsibilities
//! - Create a record on first reference to a provider name
//! - Apply success/failure/skip outcomes
//! - Answer availability, score and best-candidate queries
//! - Operator overrides and resets

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::health::state::{HealthState, ServiceHealth};
use crate::observability::metrics;

/// Thread-safe map of provider name to [`ServiceHealth`].
#[derive(Debug, Default)]
pub struct ServiceHealthRegistry {
    services: Mutex<HashMap<String, ServiceHealth>>,
}

impl ServiceHealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ServiceHealth>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the record for `name`, creating it if needed.
    fn with_service<R>(&self, name: &str, f: impl FnOnce(&mut ServiceHealth) -> R) -> R {
        let mut services = self.lock();
        let service = services
            .entry(name.to_string())
            .or_insert_with(|| ServiceHealth::new(name));
        f(service)
    }

    pub fn record_success(&self, name: &str, latency: Duration) {
        let (recovered, score) = self.with_service(name, |s| {
            let was_available = s.is_available;
            s.record_success(latency);
            (!was_available && s.is_available, s.health_score())
        });
        if recovered {
            tracing::info!(service = %name, "Service available again");
        }
        metrics::record_service_health(name, true, score);
    }

    pub fn record_failure(&self, name: &str, error: &str) {
        let (lost, available, failures, success_rate, score) = self.with_service(name, |s| {
            let was_available = s.is_available;
            s.record_failure(error);
            (
                was_available && !s.is_available,
                s.is_available,
                s.failure_count,
                s.success_rate,
                s.health_score(),
            )
        });
        if lost {
            tracing::warn!(
                service = %name,
                failures,
                success_rate,
                error = %error,
                "Service marked unavailable"
            );
        } else {
            tracing::debug!(service = %name, failures, error = %error, "Service failure recorded");
        }
        metrics::record_service_health(name, available, score);
    }

    /// Record a call that never reached the network because the device was offline.
    pub fn record_skipped(&self, name: &str) {
        self.with_service(name, ServiceHealth::record_skipped);
    }

    /// Pin availability until [`clear_override`](Self::clear_override) or a reset.
    pub fn set_availability(&self, name: &str, available: bool) {
        self.with_service(name, |s| s.set_override(available));
        tracing::info!(service = %name, available, "Manual availability override set");
    }

    pub fn clear_override(&self, name: &str) {
        self.with_service(name, ServiceHealth::clear_override);
    }

    /// Forget every statistic and override for one provider.
    pub fn reset(&self, name: &str) {
        self.lock().insert(name.to_string(), ServiceHealth::new(name));
        tracing::info!(service = %name, "Service health reset");
    }

    pub fn reset_all(&self) {
        self.lock().clear();
    }

    /// Snapshot of one provider, creating the record on first reference.
    pub fn health(&self, name: &str) -> ServiceHealth {
        self.with_service(name, |s| s.clone())
    }

    /// Snapshot of one provider without creating it.
    pub fn get(&self, name: &str) -> Option<ServiceHealth> {
        self.lock().get(name).cloned()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.with_service(name, |s| s.is_available)
    }

    pub fn is_healthy(&self, name: &str) -> bool {
        self.with_service(name, |s| s.is_healthy())
    }

    pub fn health_score(&self, name: &str) -> f64 {
        self.with_service(name, |s| s.health_score())
    }

    pub fn state(&self, name: &str) -> HealthState {
        self.with_service(name, |s| s.state())
    }

    /// The available candidate with the highest score.
    pub fn best_of<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        let mut services = self.lock();
        let mut best: Option<(&'a str, f64)> = None;
        for &name in candidates {
            let service = services
                .entry(name.to_string())
                .or_insert_with(|| ServiceHealth::new(name));
            if !service.is_available {
                continue;
            }
            let score = service.health_score();
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((name, score));
            }
        }
        best.map(|(name, _)| name)
    }

    /// All records, sorted by name.
    pub fn snapshot(&self) -> Vec<ServiceHealth> {
        let mut all: Vec<ServiceHealth> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
