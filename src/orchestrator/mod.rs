//! Hybrid route and fare orchestration.
//!
//! # Data Flow
//! ```text
//! plan_trip(origin, destination):
//!     → RoutingClient::route (cache → primary → fallback)
//!     → on error: local estimate (haversine × detour factor, average speed)
//!     → estimate_fare(route)
//!         → primary estimator → fallback estimator (coordinated as op "fare")
//!         → formula (always succeeds)
//! ```
//!
//! # Design Decisions
//! - Fare estimation never fails; the formula is the terminal tier
//! - A trip plan always carries a route, marked Estimated when providers failed

pub mod fare;

use futures_util::FutureExt;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{FareConfig, LocalEstimateConfig};
use crate::error::GeoResult;
use crate::providers::RoutingClient;
use crate::resilience::FallbackCoordinator;
use crate::types::{Coordinate, FareEstimate, FareSource, Route, RouteRequest, RouteSource};

pub use fare::{FareEstimator, FareFormula};

pub const OP_FARE: &str = "fare";

const LOCAL_PROVIDER: &str = "local-estimate";

/// Route plus fare, with the reason the route was estimated locally if it was.
#[derive(Debug, Clone, Serialize)]
pub struct TripPlan {
    pub route: Route,
    pub fare: FareEstimate,
    pub route_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HybridRouteOrchestrator {
    routing: RoutingClient,
    coordinator: FallbackCoordinator,
    formula: FareFormula,
    estimate: LocalEstimateConfig,
    primary_fare: Option<Arc<dyn FareEstimator>>,
    fallback_fare: Option<Arc<dyn FareEstimator>>,
}

impl HybridRouteOrchestrator {
    pub fn new(
        routing: RoutingClient,
        coordinator: FallbackCoordinator,
        fare: &FareConfig,
        estimate: &LocalEstimateConfig,
    ) -> Self {
        Self {
            routing,
            coordinator,
            formula: FareFormula::from_config(fare),
            estimate: estimate.clone(),
            primary_fare: None,
            fallback_fare: None,
        }
    }

    /// Install external fare estimators tried before the formula.
    pub fn with_estimators(
        mut self,
        primary: Option<Arc<dyn FareEstimator>>,
        fallback: Option<Arc<dyn FareEstimator>>,
    ) -> Self {
        self.primary_fare = primary;
        self.fallback_fare = fallback;
        self
    }

    pub fn formula(&self) -> &FareFormula {
        &self.formula
    }

    pub async fn route(&self, request: &RouteRequest) -> GeoResult<Route> {
        self.routing.route(request).await
    }

    pub async fn estimate_fare(&self, route: &Route) -> FareEstimate {
        let distance_km = route.distance_km();
        let duration_minutes = route.duration_minutes();
        let quote = |amount: f64, source: FareSource| FareEstimate {
            amount,
            currency: self.formula.currency.clone(),
            distance_km,
            duration_minutes,
            source,
        };

        if let Some(primary) = &self.primary_fare {
            let primary_call = primary
                .estimate(route)
                .map(|r| r.map(|amount| (FareSource::Primary(primary.name().to_string()), amount)));
            let fallback_call = self.fallback_fare.as_ref().map(|fallback| {
                fallback
                    .estimate(route)
                    .map(|r| {
                        r.map(|amount| (FareSource::Fallback(fallback.name().to_string()), amount))
                    })
                    .boxed()
            });

            match self.coordinator.execute(OP_FARE, primary_call, fallback_call).await {
                Ok((source, amount)) if amount.is_finite() && amount >= 0.0 => {
                    return quote(amount, source);
                }
                Ok((source, amount)) => {
                    tracing::warn!(?source, amount, "Estimator returned an unusable fare, using formula");
                }
                Err(e) => {
                    tracing::info!(error = %e, "Fare estimators failed, using formula");
                }
            }
        }

        quote(self.formula.fare(distance_km, duration_minutes), FareSource::Formula)
    }

    /// Straight-line route through the waypoints, stretched by the detour
    /// factor and timed at the configured average speed.
    pub fn local_estimate(&self, request: &RouteRequest) -> Route {
        let straight_km: f64 = request
            .waypoints
            .windows(2)
            .map(|pair| pair[0].haversine_km(&pair[1]))
            .sum();
        let distance_km = straight_km * self.estimate.detour_factor;
        let duration_s = distance_km / self.estimate.average_speed_kmh * 3600.0;
        Route {
            distance_m: distance_km * 1000.0,
            duration_s,
            polyline: None,
            geometry: request.waypoints.clone(),
            steps: Vec::new(),
            provider: LOCAL_PROVIDER.to_string(),
            source: RouteSource::Estimated,
        }
    }

    /// Route and fare for a trip. Fails only on invalid coordinates.
    pub async fn plan_trip(&self, origin: Coordinate, destination: Coordinate) -> GeoResult<TripPlan> {
        let request = RouteRequest::between(origin, destination);
        request.validate()?;

        let (route, route_error) = match self.routing.route(&request).await {
            Ok(route) => (route, None),
            Err(e) => {
                tracing::warn!(%origin, %destination, error = %e, "Routing failed, using local estimate");
                (self.local_estimate(&request), Some(e.to_string()))
            }
        };
        let fare = self.estimate_fare(&route).await;
        Ok(TripPlan {
            route,
            fare,
            route_error,
        })
    }
}
