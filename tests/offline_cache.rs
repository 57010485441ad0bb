//! Offline behavior and cache persistence across gateway restarts.

mod common;

use common::*;
use geo_gateway::cache::keys::route_key;
use geo_gateway::cache::{CacheEntry, ResponseCache};
use geo_gateway::clock::unix_millis;
use geo_gateway::types::{Coordinate, Route, RouteRequest, RouteSource};
use geo_gateway::{GeoError, GeoGateway};
use std::time::Duration;

fn trip() -> RouteRequest {
    RouteRequest::between(
        Coordinate { lat: 12.9716, lon: 77.5946 },
        Coordinate { lat: 13.0358, lon: 77.5970 },
    )
}

fn cached_route() -> Route {
    Route {
        distance_m: 8_200.0,
        duration_s: 1_500.0,
        polyline: None,
        geometry: vec![],
        steps: vec![],
        provider: "osrm".to_string(),
        source: RouteSource::Provider,
    }
}

const DAY: Duration = Duration::from_secs(24 * 3600);

/// Route cached 49 hours ago with a 24 hour TTL.
fn aged_entry(key: &str) -> CacheEntry<Route> {
    let cached_at = unix_millis() - 49 * 3600 * 1000;
    CacheEntry::cached_at(key, cached_route(), DAY, cached_at)
}

#[tokio::test]
async fn test_offline_serves_expired_entry() {
    let ors = start_mock_provider(MockResponse::json(200, ORS_ROUTE)).await;
    let mut config = test_config();
    config.routing.primary = ors_endpoint(&ors.base_url());
    let gateway = GeoGateway::new(config).unwrap();

    let key = route_key(&trip());
    gateway.cache().routes.insert_entry(aged_entry(&key));
    assert!(gateway.cache().routes.get(&key).is_none());

    gateway.gate().set_online(false);
    let route = gateway.route(&trip()).await.unwrap();
    assert_eq!(route, cached_route());
    assert_eq!(ors.request_count(), 0);

    let summary = gateway.analytics_summary();
    assert_eq!(summary.cache[0].stale_hits, 1);
    let primary = gateway.health().get("primary_route").unwrap();
    assert_eq!(primary.skipped_requests, 1);
    assert_eq!(primary.failure_count, 0);
}

#[tokio::test]
async fn test_offline_without_cache_is_network_error() {
    let ors = start_mock_provider(MockResponse::json(200, ORS_ROUTE)).await;
    let mut config = test_config();
    config.routing.primary = ors_endpoint(&ors.base_url());
    let gateway = GeoGateway::new(config).unwrap();
    gateway.gate().set_online(false);

    let err = gateway.route(&trip()).await.unwrap_err();
    assert!(matches!(err, GeoError::Network(_)), "got {err:?}");
    assert!(err.to_string().contains("offline"));
    assert_eq!(ors.request_count(), 0);

    let primary = gateway.health().get("primary_route").unwrap();
    assert_eq!(primary.skipped_requests, 1);
    assert_eq!(primary.failure_count, 0);
    assert!(primary.is_available);
}

#[tokio::test]
async fn test_back_online_reaches_network() {
    let ors = start_mock_provider(MockResponse::json(200, ORS_ROUTE)).await;
    let mut config = test_config();
    config.routing.primary = ors_endpoint(&ors.base_url());
    let gateway = GeoGateway::new(config).unwrap();

    gateway.gate().set_online(false);
    assert!(gateway.route(&trip()).await.is_err());
    assert!(gateway.gate().set_online(true));

    let route = gateway.route(&trip()).await.unwrap();
    assert_eq!(route.provider, "openrouteservice");
    assert_eq!(ors.request_count(), 1);
}

#[tokio::test]
async fn test_connectivity_probe_against_listener() {
    let mock = start_mock_provider(MockResponse::json(200, "{}")).await;

    let mut config = test_config();
    config.connectivity.probe_hosts = vec![mock.addr.to_string()];
    let gateway = GeoGateway::new(config).unwrap();
    gateway.gate().set_online(false);

    assert!(gateway.check_connectivity().await);
    assert!(gateway.gate().is_online());
    assert!(gateway.health_report().online);
}

#[tokio::test]
async fn test_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ors = start_mock_provider(MockResponse::json(200, ORS_ROUTE)).await;

    let mut config = test_config();
    config.routing.primary = ors_endpoint(&ors.base_url());
    config.cache.directory = Some(dir.path().to_string_lossy().to_string());

    let first = {
        let gateway = GeoGateway::new(config.clone()).unwrap();
        gateway.route(&trip()).await.unwrap()
    };
    assert_eq!(ors.request_count(), 1);

    let gateway = GeoGateway::new(config).unwrap();
    assert_eq!(gateway.cache_stats().total_entries, 1);
    let again = gateway.route(&trip()).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(ors.request_count(), 1);

    gateway.clear_cache();
    let reopened = ResponseCache::from_config(&gateway.config().cache);
    assert_eq!(reopened.stats().total_entries, 0);
}

#[tokio::test]
async fn test_clear_expired_only_drops_stale() {
    let gateway = GeoGateway::new(test_config()).unwrap();
    let routes = &gateway.cache().routes;
    routes.put("fresh", cached_route());
    routes.insert_entry(CacheEntry::cached_at("old", cached_route(), Duration::from_secs(1), 0));

    assert_eq!(gateway.clear_expired(), 1);
    assert!(routes.get("fresh").is_some());
    assert!(routes.get_stale("old").is_none());
}

#[tokio::test]
async fn test_expired_entries_survive_restart_for_offline_reads() {
    let dir = tempfile::tempdir().unwrap();
    let ors = start_mock_provider(MockResponse::json(200, ORS_ROUTE)).await;

    let mut config = test_config();
    config.routing.primary = ors_endpoint(&ors.base_url());
    config.cache.directory = Some(dir.path().to_string_lossy().to_string());

    let key = route_key(&trip());
    {
        let gateway = GeoGateway::new(config.clone()).unwrap();
        gateway.cache().routes.insert_entry(aged_entry(&key));
    }

    let gateway = GeoGateway::new(config).unwrap();
    assert!(gateway.cache().routes.get(&key).is_none());
    assert_eq!(gateway.cache_stats().total_entries, 1);

    gateway.gate().set_online(false);
    let route = gateway.route(&trip()).await.unwrap();
    assert_eq!(route, cached_route());
    assert_eq!(ors.request_count(), 0);

    // the sweep is what finally drops it, on disk too
    assert_eq!(gateway.clear_expired(), 1);
    let reopened = ResponseCache::from_config(&gateway.config().cache);
    assert_eq!(reopened.stats().total_entries, 0);
}
