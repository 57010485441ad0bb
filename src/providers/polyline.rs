//! Encoded polyline decoding (precision 5).

use crate::error::{GeoError, GeoResult};
use crate::types::Coordinate;

const PRECISION: f64 = 1e5;

/// Decode a polyline string into coordinates.
pub fn decode(encoded: &str) -> GeoResult<Vec<Coordinate>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lon += next_delta(bytes, &mut index)?;
        points.push(Coordinate {
            lat: lat as f64 / PRECISION,
            lon: lon as f64 / PRECISION,
        });
    }
    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> GeoResult<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes
            .get(*index)
            .ok_or_else(|| GeoError::provider("polyline", "truncated polyline"))?;
        *index += 1;
        if !(63..=126).contains(&byte) || shift > 30 {
            return Err(GeoError::provider("polyline", "invalid polyline character"));
        }
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reference_line() {
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let expected = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        assert_eq!(points.len(), 3);
        for (p, (lat, lon)) in points.iter().zip(expected) {
            assert!((p.lat - lat).abs() < 1e-9, "{p}");
            assert!((p.lon - lon).abs() < 1e-9, "{p}");
        }
    }

    #[test]
    fn test_empty_and_truncated() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("_p~iF").is_err());
        assert!(decode("_p~iF~ps|U ").is_err());
    }
}
