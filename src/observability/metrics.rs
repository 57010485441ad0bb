//! Metrics collection and exposition.
//!
//! # Metrics
//! - `geo_provider_requests_total` (counter): calls by provider, operation, outcome
//! - `geo_provider_request_duration_seconds` (histogram): provider call latency
//! - `geo_cache_lookups_total` (counter): lookups by kind and result (hit/miss/stale)
//! - `geo_cache_entries` (gauge): entries per kind
//! - `geo_rate_limited_total` (counter): local rejections by provider and reason
//! - `geo_service_available` (gauge): 1=available, 0=unavailable
//! - `geo_service_health_score` (gauge): composite score in [0, 1]
//! - `geo_online` (gauge): 1=online, 0=offline
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_provider_call(provider: &str, operation: &str, outcome: &'static str, latency: Duration) {
    counter!(
        "geo_provider_requests_total",
        "provider" => provider.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "geo_provider_request_duration_seconds",
        "provider" => provider.to_string(),
        "operation" => operation.to_string()
    )
    .record(latency.as_secs_f64());
}

pub fn record_cache_lookup(kind: &'static str, result: &'static str) {
    counter!("geo_cache_lookups_total", "kind" => kind, "result" => result).increment(1);
}

pub fn record_cache_entries(kind: &'static str, entries: usize) {
    gauge!("geo_cache_entries", "kind" => kind).set(entries as f64);
}

pub fn record_rate_limited(provider: &str, reason: &'static str) {
    counter!(
        "geo_rate_limited_total",
        "provider" => provider.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_service_health(service: &str, available: bool, score: f64) {
    gauge!("geo_service_available", "service" => service.to_string())
        .set(if available { 1.0 } else { 0.0 });
    gauge!("geo_service_health_score", "service" => service.to_string()).set(score);
}

pub fn record_online(online: bool) {
    gauge!("geo_online").set(if online { 1.0 } else { 0.0 });
}
