//! Cache key schemes.
//!
//! Coordinates are rounded so requests a few metres apart share an entry:
//! 4 decimals (~11 m) for routes, 5 (~1 m) for reverse geocoding.

use crate::types::{Coordinate, LocationBias, RouteRequest, TileCoord};

pub fn tile_key(tile: &TileCoord) -> String {
    format!("tile_{}_{}_{}", tile.z, tile.x, tile.y)
}

/// Lowercase, trimmed, whitespace-collapsed query text.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn geocode_key(query: &str, bias: Option<&LocationBias>) -> String {
    let mut key = normalize_query(query);
    if let Some(bias) = bias {
        key.push_str(&format!("@{:.2},{:.2}", bias.center.lat, bias.center.lon));
        if let Some(vb) = bias.viewbox {
            key.push_str(&format!(
                "[{:.3},{:.3},{:.3},{:.3}]",
                vb.min_lon, vb.min_lat, vb.max_lon, vb.max_lat
            ));
        }
        if bias.bounded {
            key.push('!');
        }
    }
    key
}

pub fn reverse_key(coordinate: &Coordinate) -> String {
    format!("reverse_{:.5}_{:.5}", coordinate.lat, coordinate.lon)
}

pub fn route_key(request: &RouteRequest) -> String {
    let points = request
        .waypoints
        .iter()
        .map(|c| format!("{:.4},{:.4}", c.lat, c.lon))
        .collect::<Vec<_>>()
        .join(";");
    if request.optimize_waypoints {
        format!("route_opt_{points}")
    } else {
        format!("route_{points}")
    }
}
