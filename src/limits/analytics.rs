//! Aggregate call and cache accounting for reporting.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cache::CacheKind;
use crate::clock::unix_millis;
use crate::observability::metrics;

#[derive(Debug, Default, Clone)]
struct ProviderCounters {
    requests: u64,
    successes: u64,
    errors: u64,
    rate_limited: u64,
    total_latency_ms: f64,
    last_used_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct CacheCounters {
    hits: u64,
    misses: u64,
    stale_hits: u64,
}

#[derive(Debug, Default)]
struct AnalyticsState {
    providers: HashMap<String, ProviderCounters>,
    cache: HashMap<CacheKind, CacheCounters>,
}

/// Per-provider statistics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceStats {
    pub provider: String,
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub rate_limited: u64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub last_used_ms: Option<u64>,
}

/// Cache counters for one payload kind.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheUsage {
    pub kind: CacheKind,
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
}

/// Aggregate report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_errors: u64,
    pub rate_limited: u64,
    pub avg_latency_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub cache: Vec<CacheUsage>,
    pub providers: Vec<ServiceStats>,
    pub uptime_secs: u64,
}

/// Thread-safe analytics accumulator.
#[derive(Debug)]
pub struct AnalyticsTracker {
    state: Mutex<AnalyticsState>,
    started: Instant,
}

impl Default for AnalyticsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AnalyticsState::default()),
            started: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalyticsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one network call against `provider`.
    pub fn record_call(&self, provider: &str, latency: Duration, success: bool) {
        let mut state = self.lock();
        let counters = state.providers.entry(provider.to_string()).or_default();
        counters.requests += 1;
        if success {
            counters.successes += 1;
        } else {
            counters.errors += 1;
        }
        counters.total_latency_ms += latency.as_secs_f64() * 1000.0;
        counters.last_used_ms = Some(unix_millis());
    }

    pub fn record_rate_limited(&self, provider: &str) {
        self.lock()
            .providers
            .entry(provider.to_string())
            .or_default()
            .rate_limited += 1;
    }

    pub fn record_cache_hit(&self, kind: CacheKind) {
        self.lock().cache.entry(kind).or_default().hits += 1;
        metrics::record_cache_lookup(kind.as_str(), "hit");
    }

    pub fn record_cache_miss(&self, kind: CacheKind) {
        self.lock().cache.entry(kind).or_default().misses += 1;
        metrics::record_cache_lookup(kind.as_str(), "miss");
    }

    /// Expired entry served through the offline override.
    pub fn record_stale_hit(&self, kind: CacheKind) {
        self.lock().cache.entry(kind).or_default().stale_hits += 1;
        metrics::record_cache_lookup(kind.as_str(), "stale");
    }

    pub fn service_stats(&self, provider: &str) -> Option<ServiceStats> {
        self.lock()
            .providers
            .get(provider)
            .map(|c| to_stats(provider, c))
    }

    pub fn analytics_summary(&self) -> AnalyticsSummary {
        let state = self.lock();

        let mut providers: Vec<ServiceStats> = state
            .providers
            .iter()
            .map(|(name, c)| to_stats(name, c))
            .collect();
        providers.sort_by(|a, b| a.provider.cmp(&b.provider));

        let total_calls: u64 = providers.iter().map(|p| p.requests).sum();
        let total_successes: u64 = providers.iter().map(|p| p.successes).sum();
        let total_errors: u64 = providers.iter().map(|p| p.errors).sum();
        let rate_limited: u64 = providers.iter().map(|p| p.rate_limited).sum();
        let total_latency: f64 = state.providers.values().map(|c| c.total_latency_ms).sum();

        let mut cache: Vec<CacheUsage> = state
            .cache
            .iter()
            .map(|(kind, c)| CacheUsage {
                kind: *kind,
                hits: c.hits,
                misses: c.misses,
                stale_hits: c.stale_hits,
            })
            .collect();
        cache.sort_by_key(|u| u.kind.as_str());

        let cache_hits: u64 = cache.iter().map(|c| c.hits + c.stale_hits).sum();
        let cache_misses: u64 = cache.iter().map(|c| c.misses).sum();
        let lookups = cache_hits + cache_misses;

        AnalyticsSummary {
            total_calls,
            total_successes,
            total_errors,
            rate_limited,
            avg_latency_ms: if total_calls == 0 {
                0.0
            } else {
                total_latency / total_calls as f64
            },
            cache_hits,
            cache_misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
            cache,
            providers,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.providers.clear();
        state.cache.clear();
    }
}

fn to_stats(provider: &str, c: &ProviderCounters) -> ServiceStats {
    ServiceStats {
        provider: provider.to_string(),
        requests: c.requests,
        successes: c.successes,
        errors: c.errors,
        rate_limited: c.rate_limited,
        error_rate: if c.requests == 0 {
            0.0
        } else {
            c.errors as f64 / c.requests as f64
        },
        avg_latency_ms: if c.requests == 0 {
            0.0
        } else {
            c.total_latency_ms / c.requests as f64
        },
        last_used_ms: c.last_used_ms,
    }
}
