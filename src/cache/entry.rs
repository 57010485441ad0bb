//! Cache entry value records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::clock::unix_millis;

/// The three logical maps held by the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Tile,
    Geocode,
    Route,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Tile, CacheKind::Geocode, CacheKind::Route];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Tile => "tile",
            CacheKind::Geocode => "geocode",
            CacheKind::Route => "route",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable cached payload with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub key: String,
    pub payload: V,
    /// Unix millis at which the payload was fetched.
    pub cached_at: u64,
    pub ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, payload: V, ttl: Duration) -> Self {
        Self::cached_at(key, payload, ttl, unix_millis())
    }

    pub fn cached_at(key: impl Into<String>, payload: V, ttl: Duration, cached_at: u64) -> Self {
        Self {
            key: key.into(),
            payload,
            cached_at,
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn age_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.cached_at))
    }

    /// `now - cached_at > ttl`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.cached_at) > self.ttl_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: u64 = 3_600_000;

    #[test]
    fn test_expiry_boundary() {
        let entry = CacheEntry::cached_at("k", 1u8, Duration::from_secs(3600), 0);
        assert!(!entry.is_expired_at(HOUR_MS));
        assert!(entry.is_expired_at(HOUR_MS + 1));
        assert_eq!(entry.age_at(HOUR_MS), Duration::from_secs(3600));
    }

    #[test]
    fn test_clock_skew_is_not_expiry() {
        // cached_at in the future (clock moved backwards) is treated as fresh
        let entry = CacheEntry::cached_at("k", (), Duration::from_secs(1), 10 * HOUR_MS);
        assert!(!entry.is_expired_at(HOUR_MS));
    }
}
