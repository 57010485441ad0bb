//! Fare estimation tiers.
//!
//! External estimators are optional and pluggable; the formula is always
//! available and cannot fail.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::config::FareConfig;
use crate::error::GeoResult;
use crate::types::Route;

/// An external pricing source consulted before the local formula.
#[async_trait]
pub trait FareEstimator: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Fare amount in the gateway currency.
    async fn estimate(&self, route: &Route) -> GeoResult<f64>;
}

/// `max(minimum, base + per_km * km + per_minute * minutes)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FareFormula {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum_fare: f64,
    pub currency: String,
}

impl FareFormula {
    pub fn from_config(config: &FareConfig) -> Self {
        Self {
            base_fare: config.base_fare,
            per_km: config.per_km,
            per_minute: config.per_minute,
            minimum_fare: config.minimum_fare,
            currency: config.currency.clone(),
        }
    }

    /// Negative or NaN inputs count as zero.
    pub fn fare(&self, distance_km: f64, duration_minutes: f64) -> f64 {
        let km = distance_km.max(0.0);
        let minutes = duration_minutes.max(0.0);
        let raw = self.base_fare + self.per_km * km + self.per_minute * minutes;
        raw.max(self.minimum_fare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula() {
        let formula = FareFormula::from_config(&FareConfig::default());
        assert_eq!(formula.fare(10.0, 20.0), 240.0);
        assert_eq!(formula.fare(0.0, 0.0), 50.0);
        assert_eq!(formula.fare(f64::NAN, -3.0), 50.0);
    }

    #[test]
    fn test_minimum_clamp() {
        let formula = FareFormula {
            base_fare: 0.0,
            ..FareFormula::from_config(&FareConfig::default())
        };
        // 0 + 15 * 0.1 + 2 * 1 = 3.5
        assert_eq!(formula.fare(0.1, 1.0), 25.0);
    }
}
