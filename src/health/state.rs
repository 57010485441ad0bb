//! Per-provider health record and state machine.
//!
//! # States
//! - Healthy: available, success rate > 0.8, latency < 10s, fewer than 3 failures
//! - Degraded: available but failing one of the healthy checks
//! - Unavailable: success rate <= 0.5 with at least 5 failures
//! - ManualOverride{Available,Unavailable}: operator pinned, absorbing until reset
//!
//! # State Transitions
//! ```text
//! Healthy ⇄ Degraded → Unavailable   (record_failure)
//! Unavailable → Healthy|Degraded     (record_success)
//! any → ManualOverride*              (set_availability)
//! ManualOverride* → computed state   (clear_override / reset)
//! ```
//!
//! `failure_count` never decays; recovery comes only from accumulating
//! successes or an explicit reset.

use serde::Serialize;
use std::time::Duration;

use crate::clock::unix_millis;

/// Failure count at which a provider may be marked unavailable.
pub const UNAVAILABLE_MIN_FAILURES: u32 = 5;
/// Success rate at or below which a provider may be marked unavailable.
pub const UNAVAILABLE_MAX_SUCCESS_RATE: f64 = 0.5;
/// Latency ceiling used by the score and the healthy check.
pub const LATENCY_CEILING: Duration = Duration::from_secs(10);

/// Derived provider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unavailable,
    ManualOverrideAvailable,
    ManualOverrideUnavailable,
}

/// Rolling statistics for one provider (or provider tier).
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub is_available: bool,
    pub success_rate: f64,
    /// Mean latency of successful calls.
    pub avg_response_ms: f64,
    pub failure_count: u32,
    /// Unix millis of the most recent failure.
    pub last_failure: Option<u64>,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Calls skipped because the device was offline.
    pub skipped_requests: u64,
    pub last_error: Option<String>,
    /// Operator-pinned availability.
    pub manual_override: Option<bool>,
    #[serde(skip)]
    total_response_ms: f64,
}

impl ServiceHealth {
    /// Fresh record. Starts optimistic: available with a success rate of 1.0.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_available: true,
            success_rate: 1.0,
            avg_response_ms: 0.0,
            failure_count: 0,
            last_failure: None,
            total_requests: 0,
            successful_requests: 0,
            skipped_requests: 0,
            last_error: None,
            manual_override: None,
            total_response_ms: 0.0,
        }
    }

    fn recompute_success_rate(&mut self) {
        self.success_rate = if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        };
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_response_ms += latency.as_secs_f64() * 1000.0;
        self.avg_response_ms = self.total_response_ms / self.successful_requests as f64;
        self.recompute_success_rate();
        self.is_available = self.manual_override.unwrap_or(true);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: &str) {
        self.total_requests += 1;
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(unix_millis());
        self.last_error = Some(error.to_string());
        self.recompute_success_rate();
        let computed = !(self.success_rate <= UNAVAILABLE_MAX_SUCCESS_RATE
            && self.failure_count >= UNAVAILABLE_MIN_FAILURES);
        self.is_available = self.manual_override.unwrap_or(computed);
    }

    /// Offline skip. Touches neither the success rate nor the failure streak.
    pub fn record_skipped(&mut self) {
        self.skipped_requests += 1;
    }

    pub fn set_override(&mut self, available: bool) {
        self.manual_override = Some(available);
        self.is_available = available;
    }

    /// Drop the override and fall back to the availability the statistics imply.
    pub fn clear_override(&mut self) {
        self.manual_override = None;
        self.is_available = !(self.success_rate <= UNAVAILABLE_MAX_SUCCESS_RATE
            && self.failure_count >= UNAVAILABLE_MIN_FAILURES);
    }

    pub fn avg_response_time(&self) -> Duration {
        Duration::from_secs_f64(self.avg_response_ms / 1000.0)
    }

    /// Weighted composite in [0, 1].
    pub fn health_score(&self) -> f64 {
        let ceiling_ms = LATENCY_CEILING.as_secs_f64() * 1000.0;
        let latency_factor = 1.0 - (self.avg_response_ms / ceiling_ms).min(1.0);
        let failure_factor = 1.0 - (f64::from(self.failure_count) / 10.0).min(1.0);
        let score = 0.6 * self.success_rate + 0.3 * latency_factor + 0.1 * failure_factor;
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.is_available
            && self.success_rate > 0.8
            && self.avg_response_time() < LATENCY_CEILING
            && self.failure_count < 3
    }

    pub fn state(&self) -> HealthState {
        match self.manual_override {
            Some(true) => HealthState::ManualOverrideAvailable,
            Some(false) => HealthState::ManualOverrideUnavailable,
            None if !self.is_available => HealthState::Unavailable,
            None if self.is_healthy() => HealthState::Healthy,
            None => HealthState::Degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_start() {
        let health = ServiceHealth::new("nominatim");
        assert_eq!(health.success_rate, 1.0);
        assert!(health.is_available);
        assert_eq!(health.state(), HealthState::Healthy);
    }

    #[test]
    fn test_success_rate_is_exact() {
        let mut health = ServiceHealth::new("osrm");
        for _ in 0..3 {
            health.record_failure("boom");
        }
        health.record_success(Duration::from_millis(100));
        health.record_success(Duration::from_millis(300));

        assert_eq!(health.total_requests, 5);
        assert!((health.success_rate - 0.4).abs() < f64::EPSILON);
        assert!((health.avg_response_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_needs_both_conditions() {
        let mut health = ServiceHealth::new("ors");
        for _ in 0..4 {
            health.record_failure("503");
        }
        // four failures at rate 0.0: still available, degraded
        assert!(health.is_available);
        assert_eq!(health.state(), HealthState::Degraded);

        health.record_failure("503");
        assert!(!health.is_available);
        assert_eq!(health.state(), HealthState::Unavailable);
    }

    #[test]
    fn test_single_failure_stays_available() {
        let mut health = ServiceHealth::new("ors");
        for _ in 0..20 {
            health.record_success(Duration::from_millis(50));
        }
        health.record_failure("timeout");
        assert!(health.is_available);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));
        assert!(health.last_failure.is_some());
    }

    #[test]
    fn test_success_clears_error_and_restores() {
        let mut health = ServiceHealth::new("ors");
        for _ in 0..5 {
            health.record_failure("down");
        }
        assert!(!health.is_available);
        health.record_success(Duration::from_millis(10));
        assert!(health.is_available);
        assert!(health.last_error.is_none());
        // the streak does not decay
        assert_eq!(health.failure_count, 5);
        assert_eq!(health.state(), HealthState::Degraded);
    }

    #[test]
    fn test_score_bounds() {
        let mut health = ServiceHealth::new("zero-latency");
        health.record_success(Duration::ZERO);
        assert!((health.health_score() - 1.0).abs() < 1e-9);

        let mut hopeless = ServiceHealth::new("hopeless");
        for _ in 0..1_000 {
            hopeless.record_failure("down");
        }
        let score = hopeless.health_score();
        assert!((0.0..=1.0).contains(&score));
        // success rate 0 and failure factor 0 leave only the latency term
        assert!((score - 0.3).abs() < 1e-9);

        let mut slow = ServiceHealth::new("slow");
        slow.record_success(Duration::from_secs(60));
        assert!((0.0..=1.0).contains(&slow.health_score()));
        assert!(!slow.is_healthy());
    }

    #[test]
    fn test_override_is_absorbing() {
        let mut health = ServiceHealth::new("osm-tiles");
        health.set_override(false);
        health.record_success(Duration::from_millis(5));
        assert!(!health.is_available);
        assert_eq!(health.state(), HealthState::ManualOverrideUnavailable);

        health.set_override(true);
        for _ in 0..10 {
            health.record_failure("down");
        }
        assert!(health.is_available);
        assert_eq!(health.state(), HealthState::ManualOverrideAvailable);

        health.clear_override();
        assert!(!health.is_available);
        assert_eq!(health.state(), HealthState::Unavailable);
    }

    #[test]
    fn test_skips_are_not_failures() {
        let mut health = ServiceHealth::new("nominatim");
        health.record_skipped();
        health.record_skipped();
        assert_eq!(health.skipped_requests, 2);
        assert_eq!(health.total_requests, 0);
        assert_eq!(health.failure_count, 0);
        assert_eq!(health.success_rate, 1.0);
    }
}
