//! Route calculation over OpenRouteService and OSRM.

use futures_util::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::cache::keys;
use crate::config::{RouteSchema, RoutingConfig, RoutingEndpoint};
use crate::error::{GeoError, GeoResult};
use crate::providers::http::read_json;
use crate::providers::{polyline, ProviderContext};
use crate::types::{Coordinate, Route, RouteRequest, RouteSource, RouteStep};

pub const OP_ROUTE: &str = "route";

const ORS_PROFILE: &str = "driving-car";

#[derive(Debug, Clone)]
pub struct RoutingClient {
    ctx: ProviderContext,
    primary: RoutingEndpoint,
    fallback: Option<RoutingEndpoint>,
    optimize_waypoints: bool,
}

impl RoutingClient {
    pub fn new(ctx: ProviderContext, config: &RoutingConfig) -> Self {
        Self {
            ctx,
            primary: config.primary.clone(),
            fallback: config.fallback.clone(),
            optimize_waypoints: config.optimize_waypoints,
        }
    }

    fn fallback(&self) -> Option<&RoutingEndpoint> {
        self.fallback.as_ref().filter(|_| self.ctx.fallback_enabled)
    }

    pub async fn route(&self, request: &RouteRequest) -> GeoResult<Route> {
        request.validate()?;
        let request = RouteRequest {
            waypoints: request.waypoints.clone(),
            optimize_waypoints: request.optimize_waypoints || self.optimize_waypoints,
        };

        let key = keys::route_key(&request);
        let http = &self.ctx.http;
        let primary = self.ctx.metered(
            &self.primary.name,
            OP_ROUTE,
            fetch_route(http, &self.primary, &request),
        );
        let fallback = self.fallback().map(|endpoint| {
            self.ctx
                .metered(&endpoint.name, OP_ROUTE, fetch_route(http, endpoint, &request))
                .boxed()
        });

        let route = self
            .ctx
            .cached(OP_ROUTE, &self.ctx.cache.routes, &key, primary, fallback)
            .await?;
        tracing::debug!(
            provider = %route.provider,
            distance_km = route.distance_km(),
            duration_min = route.duration_minutes(),
            "Route resolved"
        );
        Ok(route)
    }
}

async fn fetch_route(
    http: &Client,
    endpoint: &RoutingEndpoint,
    request: &RouteRequest,
) -> GeoResult<Route> {
    match endpoint.schema {
        RouteSchema::OpenRouteService => ors::route(http, endpoint, request).await,
        RouteSchema::Osrm => osrm::route(http, endpoint, request).await,
    }
}

fn base(endpoint: &RoutingEndpoint) -> &str {
    endpoint.base_url.trim_end_matches('/')
}

fn no_route(provider: &str) -> GeoError {
    GeoError::provider(provider, "no route found")
}

fn decode_geometry(provider: &str, encoded: Option<&str>) -> GeoResult<Vec<Coordinate>> {
    match encoded {
        Some(encoded) => polyline::decode(encoded)
            .map_err(|e| GeoError::provider(provider, format!("bad route geometry: {e}"))),
        None => Ok(Vec::new()),
    }
}

mod ors {
    use super::*;

    #[derive(Debug, Serialize)]
    struct DirectionsRequest {
        /// `[lon, lat]` pairs
        coordinates: Vec<[f64; 2]>,
        profile: &'static str,
        geometry: bool,
        optimize_waypoints: bool,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct DirectionsResponse {
        #[serde(default)]
        routes: Vec<OrsRoute>,
    }

    #[derive(Debug, Deserialize)]
    struct OrsRoute {
        summary: Summary,
        geometry: Option<String>,
        #[serde(default)]
        segments: Vec<Segment>,
    }

    /// ORS omits zero-valued fields.
    #[derive(Debug, Default, Deserialize)]
    struct Summary {
        #[serde(default)]
        distance: f64,
        #[serde(default)]
        duration: f64,
    }

    #[derive(Debug, Deserialize)]
    struct Segment {
        #[serde(default)]
        steps: Vec<Step>,
    }

    #[derive(Debug, Deserialize)]
    struct Step {
        #[serde(default)]
        distance: f64,
        #[serde(default)]
        duration: f64,
        instruction: String,
        name: Option<String>,
    }

    pub(super) fn into_route(body: DirectionsResponse, provider: &str) -> GeoResult<Route> {
        let raw = body.routes.into_iter().next().ok_or_else(|| no_route(provider))?;
        let steps = raw
            .segments
            .into_iter()
            .flat_map(|s| s.steps)
            .map(|s| RouteStep {
                instruction: s.instruction,
                street: s.name.filter(|n| !n.is_empty() && n != "-"),
                distance_m: s.distance,
                duration_s: s.duration,
            })
            .collect();
        Ok(Route {
            distance_m: raw.summary.distance,
            duration_s: raw.summary.duration,
            geometry: decode_geometry(provider, raw.geometry.as_deref())?,
            polyline: raw.geometry,
            steps,
            provider: provider.to_string(),
            source: RouteSource::Provider,
        })
    }

    pub(super) async fn route(
        http: &Client,
        endpoint: &RoutingEndpoint,
        request: &RouteRequest,
    ) -> GeoResult<Route> {
        let key = endpoint.api_key.as_deref().ok_or_else(|| GeoError::Auth {
            provider: endpoint.name.clone(),
            reason: "no API key configured".to_string(),
        })?;
        let body = DirectionsRequest {
            coordinates: request.waypoints.iter().map(|c| [c.lon, c.lat]).collect(),
            profile: ORS_PROFILE,
            geometry: true,
            optimize_waypoints: request.optimize_waypoints,
        };

        let response = http
            .post(format!("{}/directions/{ORS_PROFILE}", base(endpoint)))
            .header("Authorization", key)
            .json(&body)
            .send()
            .await?;
        let parsed: DirectionsResponse = read_json(&endpoint.name, response).await?;
        into_route(parsed, &endpoint.name)
    }
}

mod osrm {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub(super) struct RouteResponse {
        code: String,
        message: Option<String>,
        #[serde(default)]
        routes: Vec<OsrmRoute>,
    }

    #[derive(Debug, Deserialize)]
    struct OsrmRoute {
        distance: f64,
        duration: f64,
        geometry: Option<String>,
        #[serde(default)]
        legs: Vec<Leg>,
    }

    #[derive(Debug, Deserialize)]
    struct Leg {
        #[serde(default)]
        steps: Vec<Step>,
    }

    #[derive(Debug, Deserialize)]
    struct Step {
        distance: f64,
        duration: f64,
        #[serde(default)]
        name: String,
        maneuver: Maneuver,
    }

    #[derive(Debug, Deserialize)]
    struct Maneuver {
        #[serde(rename = "type")]
        kind: String,
        modifier: Option<String>,
    }

    /// OSRM has no prose instructions; build one from the maneuver.
    fn instruction(maneuver: &Maneuver, street: &str) -> String {
        let mut text = match maneuver.kind.as_str() {
            "depart" => "Depart".to_string(),
            "arrive" => "Arrive at destination".to_string(),
            kind => kind.replace(' ', "-"),
        };
        if let Some(modifier) = &maneuver.modifier {
            if maneuver.kind != "arrive" {
                text.push(' ');
                text.push_str(modifier);
            }
        }
        if !street.is_empty() && maneuver.kind != "arrive" {
            text.push_str(" onto ");
            text.push_str(street);
        }
        text
    }

    pub(super) fn into_route(body: RouteResponse, provider: &str) -> GeoResult<Route> {
        if body.code != "Ok" {
            return Err(GeoError::provider(
                provider,
                format!(
                    "{}: {}",
                    body.code,
                    body.message.unwrap_or_else(|| "route request rejected".to_string())
                ),
            ));
        }
        let raw = body.routes.into_iter().next().ok_or_else(|| no_route(provider))?;
        let steps = raw
            .legs
            .into_iter()
            .flat_map(|l| l.steps)
            .map(|s| RouteStep {
                instruction: instruction(&s.maneuver, &s.name),
                street: Some(s.name).filter(|n| !n.is_empty()),
                distance_m: s.distance,
                duration_s: s.duration,
            })
            .collect();
        Ok(Route {
            distance_m: raw.distance,
            duration_s: raw.duration,
            geometry: decode_geometry(provider, raw.geometry.as_deref())?,
            polyline: raw.geometry,
            steps,
            provider: provider.to_string(),
            source: RouteSource::Provider,
        })
    }

    pub(super) async fn route(
        http: &Client,
        endpoint: &RoutingEndpoint,
        request: &RouteRequest,
    ) -> GeoResult<Route> {
        let points = request
            .waypoints
            .iter()
            .map(|c| format!("{},{}", c.lon, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        let response = http
            .get(format!("{}/route/v1/driving/{points}", base(endpoint)))
            .query(&[
                ("overview", "full"),
                ("geometries", "polyline"),
                ("steps", "true"),
            ])
            .send()
            .await?;
        let parsed: RouteResponse = read_json(&endpoint.name, response).await?;
        into_route(parsed, &endpoint.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORS_BODY: &str = r#"{"routes":[{"summary":{"distance":10000.0,"duration":1200.0},
        "geometry":"_p~iF~ps|U_ulLnnqC",
        "segments":[{"distance":10000.0,"duration":1200.0,"steps":[
            {"distance":400.0,"duration":60.0,"type":11,"instruction":"Head north on MG Road","name":"MG Road"},
            {"distance":0.0,"duration":0.0,"type":10,"instruction":"Arrive at your destination","name":"-"}]}]}]}"#;

    const OSRM_BODY: &str = r#"{"code":"Ok","routes":[{"distance":9500.5,"duration":1100.0,
        "geometry":"_p~iF~ps|U_ulLnnqC",
        "legs":[{"steps":[
            {"distance":300.0,"duration":40.0,"name":"Residency Road","maneuver":{"type":"depart","modifier":"left"}},
            {"distance":200.0,"duration":30.0,"name":"MG Road","maneuver":{"type":"turn","modifier":"right"}},
            {"distance":0.0,"duration":0.0,"name":"","maneuver":{"type":"arrive"}}]}]}]}"#;

    #[test]
    fn test_ors_adapter() {
        let body: ors::DirectionsResponse = serde_json::from_str(ORS_BODY).unwrap();
        let route = ors::into_route(body, "openrouteservice").unwrap();
        assert_eq!(route.distance_km(), 10.0);
        assert_eq!(route.duration_minutes(), 20.0);
        assert_eq!(route.geometry.len(), 2);
        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.steps[0].street.as_deref(), Some("MG Road"));
        assert_eq!(route.steps[1].street, None);
        assert_eq!(route.source, RouteSource::Provider);
    }

    #[test]
    fn test_ors_empty_routes() {
        let body: ors::DirectionsResponse = serde_json::from_str(r#"{"routes":[]}"#).unwrap();
        let err = ors::into_route(body, "openrouteservice").unwrap_err();
        assert!(err.to_string().contains("no route found"));
    }

    #[test]
    fn test_osrm_adapter() {
        let body: osrm::RouteResponse = serde_json::from_str(OSRM_BODY).unwrap();
        let route = osrm::into_route(body, "osrm").unwrap();
        assert_eq!(route.distance_m, 9500.5);
        assert_eq!(route.steps[0].instruction, "Depart left onto Residency Road");
        assert_eq!(route.steps[1].instruction, "turn right onto MG Road");
        assert_eq!(route.steps[2].instruction, "Arrive at destination");
        assert_eq!(route.polyline.as_deref(), Some("_p~iF~ps|U_ulLnnqC"));
    }

    #[test]
    fn test_osrm_error_code() {
        let body: osrm::RouteResponse =
            serde_json::from_str(r#"{"code":"NoRoute","message":"Impossible route between points"}"#)
                .unwrap();
        let err = osrm::into_route(body, "osrm").unwrap_err();
        assert!(matches!(err, GeoError::Provider { .. }));
        assert!(err.to_string().contains("NoRoute"));
    }
}
