//! Provider clients for geocoding, routing and tiles.
//!
//! # Data Flow
//! ```text
//! Client call (geocode / route / tile):
//!     → cache lookup (fresh hit: return, no network)
//!     → OfflineGate (offline: stale entry or Network error, recorded as skipped)
//!     → FallbackCoordinator
//!         → primary:  RateLimiter try_acquire → HTTP → schema adapter
//!         → fallback: RateLimiter try_acquire → HTTP → schema adapter
//!     → write-through to cache
//! ```
//!
//! # Design Decisions
//! - One adapter per provider schema into the canonical types
//! - Local rate rejections count as tier failures and escalate
//! - Every network call is accounted in analytics and metrics

pub mod geocoding;
pub mod http;
pub mod polyline;
pub mod routing;
pub mod tiles;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

use futures_util::future::BoxFuture;

use crate::cache::{ResponseCache, TtlMap};
use crate::connectivity::OfflineGate;
use crate::error::{GeoError, GeoResult};
use crate::health::ServiceHealthRegistry;
use crate::limits::{AnalyticsTracker, RateLimiter};
use crate::observability::metrics;
use crate::resilience::fallback::primary_key;
use crate::resilience::FallbackCoordinator;

pub use geocoding::GeocodingClient;
pub use routing::RoutingClient;
pub use tiles::TileClient;

/// Shared collaborators handed to every provider client.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub http: Client,
    pub cache: Arc<ResponseCache>,
    pub gate: Arc<OfflineGate>,
    pub limiter: Arc<RateLimiter>,
    pub analytics: Arc<AnalyticsTracker>,
    pub coordinator: FallbackCoordinator,
    /// Global switch for the second tier.
    pub fallback_enabled: bool,
}

impl ProviderContext {
    pub fn health(&self) -> &Arc<ServiceHealthRegistry> {
        self.coordinator.health()
    }

    /// Run one network call against `provider`: rate budget, call, accounting.
    pub async fn metered<T, F>(&self, provider: &str, operation: &str, call: F) -> GeoResult<T>
    where
        F: Future<Output = GeoResult<T>>,
    {
        if let Err(e) = self.limiter.try_acquire(provider) {
            self.analytics.record_rate_limited(provider);
            return Err(e);
        }

        let start = Instant::now();
        let result = call.await;
        let latency = start.elapsed();
        self.analytics.record_call(provider, latency, result.is_ok());
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_provider_call(provider, operation, outcome, latency);
        if let Err(e) = &result {
            tracing::debug!(provider, operation, error = %e, "Provider call failed");
        }
        result
    }

    /// Cache, connectivity and coordinator pipeline shared by every client.
    pub async fn cached<'a, V, P>(
        &self,
        op_id: &str,
        map: &TtlMap<V>,
        key: &str,
        primary: P,
        fallback: Option<BoxFuture<'a, GeoResult<V>>>,
    ) -> GeoResult<V>
    where
        V: Clone + Serialize + DeserializeOwned,
        P: Future<Output = GeoResult<V>>,
    {
        if let Some(value) = map.get(key) {
            self.analytics.record_cache_hit(map.kind());
            tracing::trace!(op = op_id, key, "Cache hit");
            return Ok(value);
        }
        self.analytics.record_cache_miss(map.kind());

        if !self.gate.is_online() {
            return self.offline_result(op_id, map, key);
        }

        let value = self.coordinator.execute(op_id, primary, fallback).await?;
        map.put(key, value.clone());
        Ok(value)
    }

    /// Network is skipped while offline. An expired entry is still better
    /// than nothing; without one the call fails with a `Network` error.
    fn offline_result<V>(&self, op_id: &str, map: &TtlMap<V>, key: &str) -> GeoResult<V>
    where
        V: Clone + Serialize + DeserializeOwned,
    {
        self.health().record_skipped(&primary_key(op_id));
        match map.get_stale(key) {
            Some(entry) => {
                self.analytics.record_stale_hit(map.kind());
                tracing::debug!(op = op_id, key, cached_at = entry.cached_at, "Offline, serving expired entry");
                Ok(entry.payload)
            }
            None => {
                tracing::debug!(op = op_id, key, "Offline with no cached entry");
                Err(GeoError::offline(op_id))
            }
        }
    }
}
