//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration for the geo gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Shared HTTP client settings.
    pub client: ClientConfig,

    /// Forward/reverse geocoding providers.
    pub geocoding: GeocodingConfig,

    /// Route calculation providers.
    pub routing: RoutingConfig,

    /// Map tile providers.
    pub tiles: TileConfig,

    /// Per-call timeouts.
    pub timeouts: TimeoutConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Fallback tier switch.
    pub fallback: FallbackConfig,

    /// Rate policies keyed by provider name.
    pub rate_limits: BTreeMap<String, RateLimitPolicy>,

    /// Fare formula parameters.
    pub fare: FareConfig,

    /// Local route estimate used when every routing tier fails.
    pub estimate: LocalEstimateConfig,

    /// Connectivity probing.
    pub connectivity: ConnectivityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client identifier sent as `User-Agent` (required by OSM services).
    pub user_agent: String,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("geo-gateway/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_ms: 5_000,
        }
    }
}

/// Response layout spoken by a geocoding endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSchema {
    /// Nominatim JSON (`/search`, `/reverse`).
    Nominatim,
    /// Pelias GeoJSON as served by OpenRouteService.
    Pelias,
}

/// A single geocoding endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodingEndpoint {
    /// Provider name used for rate limits, analytics and logs.
    pub name: String,

    pub schema: GeocodeSchema,

    /// Base URL; `/search` and `/reverse` are appended.
    pub base_url: String,

    /// API key sent as `Authorization` when present.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Geocoding provider tiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub primary: GeocodingEndpoint,
    pub fallback: Option<GeocodingEndpoint>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            primary: GeocodingEndpoint {
                name: "nominatim".to_string(),
                schema: GeocodeSchema::Nominatim,
                base_url: "https://nominatim.openstreetmap.org".to_string(),
                api_key: None,
            },
            fallback: None,
        }
    }
}

/// Response layout spoken by a routing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSchema {
    /// `POST /directions/driving-car` with an `Authorization` key.
    OpenRouteService,
    /// `GET /route/v1/driving/{coords}`.
    Osrm,
}

/// A single routing endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingEndpoint {
    pub name: String,

    pub schema: RouteSchema,

    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

/// Routing provider tiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub primary: RoutingEndpoint,
    pub fallback: Option<RoutingEndpoint>,

    /// Ask the provider to reorder intermediate waypoints.
    pub optimize_waypoints: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary: RoutingEndpoint {
                name: "openrouteservice".to_string(),
                schema: RouteSchema::OpenRouteService,
                base_url: "https://api.openrouteservice.org/v2".to_string(),
                api_key: None,
            },
            fallback: Some(RoutingEndpoint {
                name: "osrm".to_string(),
                schema: RouteSchema::Osrm,
                base_url: "https://router.project-osrm.org".to_string(),
                api_key: None,
            }),
            optimize_waypoints: false,
        }
    }
}

/// A single tile endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TileEndpoint {
    pub name: String,

    /// URL with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
}

/// Tile provider tiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TileConfig {
    pub primary: TileEndpoint,
    pub fallback: Option<TileEndpoint>,

    /// Highest zoom level accepted.
    pub max_zoom: u8,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            primary: TileEndpoint {
                name: "osm-tiles".to_string(),
                url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            },
            fallback: None,
            max_zoom: 19,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline applied to each provider tier, in milliseconds.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 10_000 }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for the persistent store. In-memory only when unset.
    pub directory: Option<String>,

    pub tile_ttl_secs: u64,
    pub geocode_ttl_secs: u64,
    pub route_ttl_secs: u64,

    /// Interval of the background expired-entry sweep.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            tile_ttl_secs: 24 * 3600,
            geocode_ttl_secs: 24 * 3600,
            route_ttl_secs: 6 * 3600,
            sweep_interval_secs: 3600,
        }
    }
}

/// Fallback tier switch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// When false, configured fallback endpoints are never called.
    pub enabled: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Rate policy for one provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitPolicy {
    /// Requests allowed inside the trailing window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed until the quota is reset. Unlimited when unset.
    #[serde(default)]
    pub daily_quota: Option<u32>,
}

impl RateLimitPolicy {
    pub fn per_second(max_requests: u32) -> Self {
        Self {
            max_requests,
            window_ms: 1_000,
            daily_quota: None,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Default policies: Nominatim's usage policy allows 1 req/s, the OSM tile
/// servers ask for modest bulk rates, and the OpenRouteService free plan
/// allows 40 directions/minute and 2000/day.
pub fn default_rate_limits() -> BTreeMap<String, RateLimitPolicy> {
    let mut limits = BTreeMap::new();
    limits.insert("nominatim".to_string(), RateLimitPolicy::per_second(1));
    limits.insert("osm-tiles".to_string(), RateLimitPolicy::per_second(10));
    limits.insert(
        "openrouteservice".to_string(),
        RateLimitPolicy {
            max_requests: 40,
            window_ms: 60_000,
            daily_quota: Some(2_000),
        },
    );
    limits
}

/// Fare formula parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FareConfig {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum_fare: f64,
    pub currency: String,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            base_fare: 50.0,
            per_km: 15.0,
            per_minute: 2.0,
            minimum_fare: 25.0,
            currency: "INR".to_string(),
        }
    }
}

/// Straight-line route estimate parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalEstimateConfig {
    /// Road distance over great-circle distance.
    pub detour_factor: f64,

    /// Assumed average driving speed.
    pub average_speed_kmh: f64,
}

impl Default for LocalEstimateConfig {
    fn default() -> Self {
        Self {
            detour_factor: 1.3,
            average_speed_kmh: 30.0,
        }
    }
}

/// Connectivity probing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// `host:port` candidates; the first successful TCP connect wins.
    pub probe_hosts: Vec<String>,

    pub probe_timeout_ms: u64,

    /// Background probe interval. Zero disables the probe loop.
    pub probe_interval_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_hosts: vec![
                "1.1.1.1:53".to_string(),
                "8.8.8.8:53".to_string(),
                "9.9.9.9:53".to_string(),
            ],
            probe_timeout_ms: 3_000,
            probe_interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            geocoding: GeocodingConfig::default(),
            routing: RoutingConfig::default(),
            tiles: TileConfig::default(),
            timeouts: TimeoutConfig::default(),
            cache: CacheConfig::default(),
            fallback: FallbackConfig::default(),
            rate_limits: default_rate_limits(),
            fare: FareConfig::default(),
            estimate: LocalEstimateConfig::default(),
            connectivity: ConnectivityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.cache.tile_ttl_secs, 86_400);
        assert_eq!(config.cache.route_ttl_secs, 21_600);
        assert_eq!(config.timeouts.request(), Duration::from_secs(10));
        assert!(config.fallback.enabled);
        assert_eq!(config.rate_limits["nominatim"].max_requests, 1);
        assert_eq!(
            config.rate_limits["openrouteservice"].daily_quota,
            Some(2_000)
        );
    }

    #[test]
    fn test_partial_toml() {
        let raw = r#"
            [fallback]
            enabled = false

            [routing.primary]
            name = "ors"
            schema = "open_route_service"
            base_url = "http://localhost:8080/ors/v2"
            api_key = "secret"

            [rate_limits.ors]
            max_requests = 5
            window_ms = 1000
            daily_quota = 100
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert!(!config.fallback.enabled);
        assert_eq!(config.routing.primary.schema, RouteSchema::OpenRouteService);
        assert_eq!(config.routing.primary.api_key.as_deref(), Some("secret"));
        // untouched sections keep their defaults
        assert!(config.routing.fallback.is_some());
        assert_eq!(config.geocoding.primary.schema, GeocodeSchema::Nominatim);
        assert_eq!(config.rate_limits["ors"].daily_quota, Some(100));
        // an explicit table replaces the built-in policies
        assert!(!config.rate_limits.contains_key("nominatim"));
    }
}
