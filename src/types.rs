//! Canonical geospatial types shared by every provider adapter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GeoError, GeoResult};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> GeoResult<Self> {
        let coordinate = Self { lat, lon };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(GeoError::InvalidRequest(format!(
                "coordinate out of range: {lat},{lon}"
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Parses `"lat,lon"`.
impl FromStr for Coordinate {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| GeoError::InvalidRequest(format!("expected 'lat,lon', got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| GeoError::InvalidRequest(format!("bad coordinate '{v}': {e}")))
        };
        Coordinate::new(parse(lat)?, parse(lon)?)
    }
}

/// Axis-aligned box used to bias geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Location hint for forward geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationBias {
    pub center: Coordinate,
    pub viewbox: Option<BoundingBox>,
    /// Restrict results to the viewbox.
    pub bounded: bool,
}

impl LocationBias {
    pub fn near(center: Coordinate) -> Self {
        Self {
            center,
            viewbox: None,
            bounded: false,
        }
    }
}

/// Geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub coordinate: Coordinate,
    /// Provider category such as `house`, `street` or `locality`.
    pub category: Option<String>,
    /// Provider relevance in [0, 1] when reported.
    pub relevance: Option<f64>,
    pub provider: String,
}

/// Slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Reject zooms above `max_zoom` and x/y outside the 2^z grid.
    pub fn validate(&self, max_zoom: u8) -> GeoResult<()> {
        if self.z > max_zoom {
            return Err(GeoError::InvalidRequest(format!(
                "zoom {} exceeds maximum {max_zoom}",
                self.z
            )));
        }
        let size = 1u64.checked_shl(u32::from(self.z)).unwrap_or(u64::MAX);
        if u64::from(self.x) >= size || u64::from(self.y) >= size {
            return Err(GeoError::InvalidRequest(format!(
                "tile {}/{}/{} outside the grid at zoom {}",
                self.z, self.x, self.y, self.z
            )));
        }
        Ok(())
    }

    pub fn fill_template(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Raw tile image bytes; base64 in the persisted codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileData(#[serde(with = "crate::cache::codec::base64_bytes")] pub Vec<u8>);

impl TileData {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where a route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Provider,
    /// Straight-line estimate computed locally.
    Estimated,
}

/// One turn-by-turn instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub street: Option<String>,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Canonical route descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Encoded polyline (precision 5) as returned by the provider.
    pub polyline: Option<String>,
    pub geometry: Vec<Coordinate>,
    pub steps: Vec<RouteStep>,
    pub provider: String,
    pub source: RouteSource,
}

impl Route {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_s / 60.0
    }
}

/// Route lookup input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Origin, optional intermediate stops, destination.
    pub waypoints: Vec<Coordinate>,
    pub optimize_waypoints: bool,
}

impl RouteRequest {
    pub fn between(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            waypoints: vec![origin, destination],
            optimize_waypoints: false,
        }
    }

    pub fn validate(&self) -> GeoResult<()> {
        if self.waypoints.len() < 2 {
            return Err(GeoError::InvalidRequest(
                "a route needs at least an origin and a destination".to_string(),
            ));
        }
        if let Some(bad) = self.waypoints.iter().find(|c| !c.is_valid()) {
            return Err(GeoError::InvalidRequest(format!("invalid waypoint {bad}")));
        }
        Ok(())
    }
}

/// Which estimator produced a fare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tier", content = "estimator")]
pub enum FareSource {
    Primary(String),
    Fallback(String),
    Formula,
}

/// Fare quote for a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareEstimate {
    pub amount: f64,
    pub currency: String,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub source: FareSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_parse() {
        let c: Coordinate = "12.9716, 77.5946".parse().unwrap();
        assert_eq!(c, Coordinate { lat: 12.9716, lon: 77.5946 });
        assert!("91,0".parse::<Coordinate>().is_err());
        assert!("12.9".parse::<Coordinate>().is_err());
        assert!("abc,1".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_haversine() {
        let paris = Coordinate { lat: 48.8566, lon: 2.3522 };
        let london = Coordinate { lat: 51.5074, lon: -0.1278 };
        let d = paris.haversine_km(&london);
        assert!((d - 343.5).abs() < 1.0, "got {d}");
        assert_eq!(paris.haversine_km(&paris), 0.0);
    }

    #[test]
    fn test_tile_validation() {
        assert!(TileCoord::new(0, 0, 0).validate(19).is_ok());
        assert!(TileCoord::new(2, 3, 3).validate(19).is_ok());
        assert!(TileCoord::new(2, 4, 0).validate(19).is_err());
        assert!(TileCoord::new(20, 0, 0).validate(19).is_err());
    }

    #[test]
    fn test_tile_validation_with_huge_max_zoom() {
        assert!(TileCoord::new(64, 0, 0).validate(u8::MAX).is_ok());
        assert!(TileCoord::new(200, u32::MAX, 7).validate(u8::MAX).is_ok());
        assert!(TileCoord::new(31, 1 << 31, 0).validate(u8::MAX).is_err());
    }

    #[test]
    fn test_fill_template() {
        let tile = TileCoord::new(12, 2930, 1844);
        assert_eq!(
            tile.fill_template("https://tile.example/{z}/{x}/{y}.png"),
            "https://tile.example/12/2930/1844.png"
        );
    }

    #[test]
    fn test_route_request_validation() {
        let a = Coordinate { lat: 1.0, lon: 1.0 };
        assert!(RouteRequest::between(a, a).validate().is_ok());
        let single = RouteRequest {
            waypoints: vec![a],
            optimize_waypoints: false,
        };
        assert!(single.validate().is_err());
    }
}
