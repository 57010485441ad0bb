//! The gateway service: every component built from one configuration.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::validation::validate_config;
use crate::config::GatewayConfig;
use crate::connectivity::OfflineGate;
use crate::error::{GeoError, GeoResult};
use crate::health::{HealthState, ServiceHealth, ServiceHealthRegistry};
use crate::lifecycle::Shutdown;
use crate::limits::{AnalyticsSummary, AnalyticsTracker, RateLimiter};
use crate::orchestrator::{FareEstimator, HybridRouteOrchestrator, TripPlan};
use crate::providers::http::build_client;
use crate::providers::{GeocodingClient, ProviderContext, RoutingClient, TileClient};
use crate::resilience::FallbackCoordinator;
use crate::types::{
    Coordinate, FareEstimate, LocationBias, Place, Route, RouteRequest, TileCoord, TileData,
};

/// Health record plus its derived views.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    #[serde(flatten)]
    pub health: ServiceHealth,
    pub health_score: f64,
    pub healthy: bool,
    pub state: HealthState,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub online: bool,
    pub services: Vec<ServiceReport>,
}

/// Entry point for geocoding, routing, tiles and fares.
#[derive(Debug, Clone)]
pub struct GeoGateway {
    config: Arc<GatewayConfig>,
    ctx: ProviderContext,
    geocoding: GeocodingClient,
    tiles: TileClient,
    orchestrator: HybridRouteOrchestrator,
}

impl GeoGateway {
    /// Build with the cache store named by `config.cache.directory`.
    pub fn new(config: GatewayConfig) -> GeoResult<Self> {
        let cache = ResponseCache::from_config(&config.cache);
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: GatewayConfig, cache: ResponseCache) -> GeoResult<Self> {
        if let Err(errors) = validate_config(&config) {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GeoError::Configuration(joined));
        }

        let health = Arc::new(ServiceHealthRegistry::new());
        let ctx = ProviderContext {
            http: build_client(&config.client)?,
            cache: Arc::new(cache),
            gate: Arc::new(OfflineGate::new(&config.connectivity)),
            limiter: Arc::new(RateLimiter::new(&config.rate_limits)),
            analytics: Arc::new(AnalyticsTracker::new()),
            coordinator: FallbackCoordinator::with_timeout(health, config.timeouts.request()),
            fallback_enabled: config.fallback.enabled,
        };

        let geocoding = GeocodingClient::new(ctx.clone(), &config.geocoding);
        let tiles = TileClient::new(ctx.clone(), &config.tiles);
        let orchestrator = HybridRouteOrchestrator::new(
            RoutingClient::new(ctx.clone(), &config.routing),
            ctx.coordinator.clone(),
            &config.fare,
            &config.estimate,
        );

        tracing::info!(
            geocoding = %config.geocoding.primary.name,
            routing = %config.routing.primary.name,
            routing_fallback = config.routing.fallback.as_ref().map(|e| e.name.as_str()).unwrap_or("none"),
            tiles = %config.tiles.primary.name,
            fallback_enabled = config.fallback.enabled,
            "Gateway initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            ctx,
            geocoding,
            tiles,
            orchestrator,
        })
    }

    /// Install external fare estimators tried before the formula.
    pub fn with_fare_estimators(
        mut self,
        primary: Option<Arc<dyn FareEstimator>>,
        fallback: Option<Arc<dyn FareEstimator>>,
    ) -> Self {
        self.orchestrator = self.orchestrator.with_estimators(primary, fallback);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn health(&self) -> &Arc<ServiceHealthRegistry> {
        self.ctx.health()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.ctx.limiter
    }

    pub fn analytics(&self) -> &Arc<AnalyticsTracker> {
        &self.ctx.analytics
    }

    pub fn gate(&self) -> &Arc<OfflineGate> {
        &self.ctx.gate
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.ctx.cache
    }

    pub async fn geocode(&self, query: &str, bias: Option<&LocationBias>) -> GeoResult<Vec<Place>> {
        self.geocoding.geocode(query, bias).await
    }

    pub async fn reverse_geocode(&self, coordinate: Coordinate) -> GeoResult<Option<Place>> {
        self.geocoding.reverse_geocode(coordinate).await
    }

    pub async fn route(&self, request: &RouteRequest) -> GeoResult<Route> {
        self.orchestrator.route(request).await
    }

    pub async fn tile(&self, tile: TileCoord) -> GeoResult<TileData> {
        self.tiles.tile(tile).await
    }

    pub async fn estimate_fare(&self, route: &Route) -> FareEstimate {
        self.orchestrator.estimate_fare(route).await
    }

    pub async fn plan_trip(&self, origin: Coordinate, destination: Coordinate) -> GeoResult<TripPlan> {
        self.orchestrator.plan_trip(origin, destination).await
    }

    pub fn health_report(&self) -> HealthReport {
        let services = self
            .health()
            .snapshot()
            .into_iter()
            .map(|health| ServiceReport {
                health_score: health.health_score(),
                healthy: health.is_healthy(),
                state: health.state(),
                health,
            })
            .collect();
        HealthReport {
            online: self.ctx.gate.is_online(),
            services,
        }
    }

    pub fn analytics_summary(&self) -> AnalyticsSummary {
        self.ctx.analytics.analytics_summary()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.ctx.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.ctx.cache.clear_all();
    }

    pub fn clear_expired(&self) -> usize {
        self.ctx.cache.clear_expired()
    }

    pub async fn check_connectivity(&self) -> bool {
        self.ctx.gate.check_connectivity().await
    }

    /// Start the connectivity probe loop and the cache sweeper.
    pub fn spawn_background_tasks(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let probe_interval = Duration::from_secs(self.config.connectivity.probe_interval_secs);
        let sweep_interval = Duration::from_secs(self.config.cache.sweep_interval_secs);

        let gate = self.ctx.gate.clone();
        let gate_shutdown = shutdown.subscribe();
        let probe = tokio::spawn(async move { gate.run(probe_interval, gate_shutdown).await });

        let cache = self.ctx.cache.clone();
        let sweep_shutdown = shutdown.subscribe();
        let sweeper =
            tokio::spawn(async move { cache.run_sweeper(sweep_interval, sweep_shutdown).await });

        vec![probe, sweeper]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectivityConfig;

    fn offline_config() -> GatewayConfig {
        GatewayConfig {
            connectivity: ConnectivityConfig {
                probe_hosts: vec!["127.0.0.1:1".to_string()],
                probe_timeout_ms: 200,
                probe_interval_secs: 3600,
            },
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_ms = 0;
        let err = GeoGateway::new(config).unwrap_err();
        assert!(matches!(err, GeoError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_health_report_lists_tiers() {
        let gateway = GeoGateway::new(GatewayConfig::default()).unwrap();
        gateway.health().record_failure("primary_route", "down");
        gateway.health().record_success("fallback_route", Duration::from_millis(120));

        let report = gateway.health_report();
        assert!(report.online);
        let names: Vec<_> = report.services.iter().map(|s| s.health.name.as_str()).collect();
        assert_eq!(names, vec!["fallback_route", "primary_route"]);
        assert_eq!(report.services[1].state, HealthState::Degraded);
    }

    #[tokio::test]
    async fn test_background_tasks_stop_on_shutdown() {
        let gateway = GeoGateway::new(offline_config()).unwrap();
        let shutdown = Shutdown::new();
        let mut changes = gateway.gate().subscribe();
        let handles = gateway.spawn_background_tasks(&shutdown);
        assert_eq!(shutdown.receiver_count(), 2);

        // the first probe tick fires immediately and finds nothing reachable
        tokio::time::timeout(Duration::from_secs(5), changes.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!gateway.gate().is_online());

        shutdown.trigger();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
