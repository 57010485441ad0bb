//! Per-provider request budgets.
//!
//! Each provider may carry a sliding-window limit (`max_requests` per
//! `window`) and a decrementing quota. Providers without a policy are
//! unlimited. Windows use `tokio::time::Instant` so tests can drive the clock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitPolicy;
use crate::error::{GeoError, GeoResult};
use crate::observability::metrics;

/// Sliding window and quota state for one provider.
#[derive(Debug)]
struct RateWindow {
    policy: RateLimitPolicy,
    timestamps: VecDeque<Instant>,
    remaining_quota: Option<u32>,
}

impl RateWindow {
    fn new(policy: RateLimitPolicy) -> Self {
        Self {
            remaining_quota: policy.daily_quota,
            policy,
            timestamps: VecDeque::new(),
        }
    }

    fn purge(&mut self, now: Instant) {
        let window = self.policy.window();
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn window_open(&mut self, now: Instant) -> bool {
        self.purge(now);
        self.timestamps.len() < self.policy.max_requests as usize
    }

    fn quota_exhausted(&self) -> bool {
        self.remaining_quota == Some(0)
    }

    fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
        if let Some(remaining) = self.remaining_quota.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    fn retry_after(&mut self, now: Instant) -> Option<Duration> {
        if self.window_open(now) {
            return None;
        }
        self.timestamps
            .front()
            .map(|&oldest| self.policy.window().saturating_sub(now.duration_since(oldest)))
    }
}

/// Rate limiter keyed by provider name.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(policies: &BTreeMap<String, RateLimitPolicy>) -> Self {
        let windows = policies
            .iter()
            .map(|(name, policy)| (name.clone(), RateWindow::new(policy.clone())))
            .collect();
        Self {
            windows: Mutex::new(windows),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install or replace a provider policy. Resets its window and quota.
    pub fn set_policy(&self, provider: &str, policy: RateLimitPolicy) {
        self.lock().insert(provider.to_string(), RateWindow::new(policy));
    }

    pub fn policy(&self, provider: &str) -> Option<RateLimitPolicy> {
        self.lock().get(provider).map(|w| w.policy.clone())
    }

    /// Whether the sliding window has room and the quota is not exhausted.
    pub fn can_make_request(&self, provider: &str) -> bool {
        let now = Instant::now();
        match self.lock().get_mut(provider) {
            Some(window) => !window.quota_exhausted() && window.window_open(now),
            None => true,
        }
    }

    /// Count a request against the window and the quota.
    pub fn record_request(&self, provider: &str) {
        let now = Instant::now();
        if let Some(window) = self.lock().get_mut(provider) {
            window.record(now);
        }
    }

    /// Remaining quota, `None` for providers without one.
    pub fn remaining_daily_requests(&self, provider: &str) -> Option<u32> {
        self.lock().get(provider).and_then(|w| w.remaining_quota)
    }

    /// Fail with a quota error when the provider's quota is used up.
    pub fn ensure_quota(&self, provider: &str) -> GeoResult<()> {
        if self.remaining_daily_requests(provider) == Some(0) {
            metrics::record_rate_limited(provider, "quota");
            return Err(GeoError::RateLimit {
                provider: provider.to_string(),
                reason: "daily quota exhausted".to_string(),
            });
        }
        Ok(())
    }

    /// Check and record in one step; rejects before any network call.
    pub fn try_acquire(&self, provider: &str) -> GeoResult<()> {
        let now = Instant::now();
        let mut windows = self.lock();
        let Some(window) = windows.get_mut(provider) else {
            return Ok(());
        };

        if window.quota_exhausted() {
            drop(windows);
            metrics::record_rate_limited(provider, "quota");
            tracing::warn!(provider = %provider, "Daily quota exhausted");
            return Err(GeoError::RateLimit {
                provider: provider.to_string(),
                reason: "daily quota exhausted".to_string(),
            });
        }

        if let Some(wait) = window.retry_after(now) {
            let limit = window.policy.max_requests;
            let window_ms = window.policy.window_ms;
            drop(windows);
            metrics::record_rate_limited(provider, "window");
            tracing::debug!(provider = %provider, limit, window_ms, retry_after_ms = wait.as_millis() as u64, "Rate window full");
            return Err(GeoError::RateLimit {
                provider: provider.to_string(),
                reason: format!(
                    "{limit} requests per {window_ms}ms exceeded, retry in {}ms",
                    wait.as_millis()
                ),
            });
        }

        window.record(now);
        Ok(())
    }

    /// Time until the window admits another request, `None` if it already does.
    pub fn retry_after(&self, provider: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock().get_mut(provider).and_then(|w| w.retry_after(now))
    }

    /// Restore the full quota. Triggered externally (scheduler or operator).
    pub fn reset_daily_quota(&self, provider: &str) {
        if let Some(window) = self.lock().get_mut(provider) {
            window.remaining_quota = window.policy.daily_quota;
            tracing::info!(provider = %provider, quota = ?window.remaining_quota, "Daily quota reset");
        }
    }

    pub fn reset_all_quotas(&self) {
        for window in self.lock().values_mut() {
            window.remaining_quota = window.policy.daily_quota;
        }
    }
}
