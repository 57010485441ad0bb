//! TTL maps for tiles, geocodes and routes.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::cache::codec::{decode_entry, encode_entry};
use crate::cache::entry::{CacheEntry, CacheKind};
use crate::cache::store::{CacheStore, FileStore, MemoryStore};
use crate::clock::unix_millis;
use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::types::{Place, Route, TileData};

/// Entry count and encoded size of one cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct KindStats {
    pub kind: CacheKind,
    pub entries: usize,
    pub expired: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub kinds: Vec<KindStats>,
    pub total_entries: usize,
    pub total_bytes: usize,
}

/// In-memory TTL map with write-through persistence.
///
/// Store failures are logged and never surface to callers: a failed read is
/// a miss and a failed write leaves the entry in memory only.
#[derive(Debug)]
pub struct TtlMap<V> {
    kind: CacheKind,
    default_ttl: Duration,
    entries: DashMap<String, (CacheEntry<V>, usize)>,
    store: Arc<dyn CacheStore>,
}

impl<V> TtlMap<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Create the map and warm it from `store`. Corrupt records are removed;
    /// expired ones are kept for offline reads.
    pub fn new(kind: CacheKind, default_ttl: Duration, store: Arc<dyn CacheStore>) -> Self {
        let map = Self {
            kind,
            default_ttl,
            entries: DashMap::new(),
            store,
        };
        map.warm();
        map
    }

    fn warm(&self) {
        let records = match self.store.load_all(self.kind) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(kind = %self.kind, error = %e, "Failed to load persisted cache");
                return;
            }
        };

        // Expired records stay loaded for offline reads until the sweep.
        let now = unix_millis();
        let mut dropped = 0usize;
        let mut expired = 0usize;
        for (key, bytes) in records {
            match decode_entry::<V>(&bytes) {
                Ok(entry) => {
                    if entry.is_expired_at(now) {
                        expired += 1;
                    }
                    self.entries.insert(key, (entry, bytes.len()));
                }
                Err(e) => {
                    tracing::warn!(kind = %self.kind, key = %key, error = %e, "Dropping corrupt cache record");
                    dropped += 1;
                    self.remove_persisted(&key);
                }
            }
        }
        if !self.entries.is_empty() || dropped > 0 {
            tracing::info!(
                kind = %self.kind,
                loaded = self.entries.len(),
                expired,
                dropped,
                "Warmed cache from store"
            );
        }
        metrics::record_cache_entries(self.kind.as_str(), self.entries.len());
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fresh payload for `key`. An expired entry is a miss but stays
    /// available to [`TtlMap::get_stale`] until the next sweep.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        let (entry, _) = entry.value();
        if entry.is_expired_at(unix_millis()) {
            None
        } else {
            Some(entry.payload.clone())
        }
    }

    /// Payload for `key` regardless of age.
    pub fn get_stale(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.get(key).map(|e| e.value().0.clone())
    }

    pub fn contains_fresh(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn put(&self, key: &str, payload: V) {
        self.put_with_ttl(key, payload, self.default_ttl);
    }

    pub fn put_with_ttl(&self, key: &str, payload: V, ttl: Duration) {
        self.insert_entry(CacheEntry::new(key, payload, ttl));
    }

    /// Insert a pre-built entry, keeping its `cached_at`.
    pub fn insert_entry(&self, entry: CacheEntry<V>) {
        let size = match encode_entry(&entry) {
            Ok(bytes) => {
                if let Err(e) = self.store.put(self.kind, &entry.key, &bytes) {
                    tracing::warn!(kind = %self.kind, key = %entry.key, error = %e, "Cache write-through failed");
                }
                bytes.len()
            }
            Err(e) => {
                tracing::warn!(kind = %self.kind, error = %e, "Cache entry not persisted");
                0
            }
        };
        self.entries.insert(entry.key.clone(), (entry, size));
        metrics::record_cache_entries(self.kind.as_str(), self.entries.len());
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.remove_persisted(key);
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        if let Err(e) = self.store.clear(self.kind) {
            tracing::warn!(kind = %self.kind, error = %e, "Failed to clear persisted cache");
        }
        metrics::record_cache_entries(self.kind.as_str(), 0);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = unix_millis();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|r| r.value().0.is_expired_at(now))
            .map(|r| r.key().clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
            self.remove_persisted(key);
        }
        metrics::record_cache_entries(self.kind.as_str(), self.entries.len());
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> KindStats {
        let now = unix_millis();
        let mut stats = KindStats {
            kind: self.kind,
            entries: 0,
            expired: 0,
            bytes: 0,
        };
        for r in self.entries.iter() {
            let (entry, size) = r.value();
            stats.entries += 1;
            stats.bytes += size;
            if entry.is_expired_at(now) {
                stats.expired += 1;
            }
        }
        stats
    }

    fn remove_persisted(&self, key: &str) {
        if let Err(e) = self.store.remove(self.kind, key) {
            tracing::warn!(kind = %self.kind, key, error = %e, "Failed to remove persisted entry");
        }
    }
}

/// Tile, geocode and route caches sharing one store.
#[derive(Debug)]
pub struct ResponseCache {
    pub tiles: TtlMap<TileData>,
    pub geocodes: TtlMap<Vec<Place>>,
    pub routes: TtlMap<Route>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            tiles: TtlMap::new(
                CacheKind::Tile,
                Duration::from_secs(config.tile_ttl_secs),
                store.clone(),
            ),
            geocodes: TtlMap::new(
                CacheKind::Geocode,
                Duration::from_secs(config.geocode_ttl_secs),
                store.clone(),
            ),
            routes: TtlMap::new(
                CacheKind::Route,
                Duration::from_secs(config.route_ttl_secs),
                store,
            ),
        }
    }

    /// Open the configured directory, or keep everything in memory.
    ///
    /// An unusable directory degrades to memory with a warning.
    pub fn from_config(config: &CacheConfig) -> Self {
        let store: Arc<dyn CacheStore> = match config.directory.as_deref() {
            Some(dir) => match FileStore::open(dir) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(path = dir, error = %e, "Cache directory unusable, using memory");
                    Arc::new(MemoryStore::new())
                }
            },
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store)
    }

    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn clear_all(&self) {
        self.tiles.clear();
        self.geocodes.clear();
        self.routes.clear();
        tracing::info!("Cleared all caches");
    }

    pub fn clear_expired(&self) -> usize {
        let removed =
            self.tiles.clear_expired() + self.geocodes.clear_expired() + self.routes.clear_expired();
        if removed > 0 {
            tracing::debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let kinds = vec![self.tiles.stats(), self.geocodes.stats(), self.routes.stats()];
        CacheStats {
            total_entries: kinds.iter().map(|k| k.entries).sum(),
            total_bytes: kinds.iter().map(|k| k.bytes).sum(),
            kinds,
        }
    }

    /// Periodically sweep expired entries until shutdown.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        tracing::info!(interval_secs = interval.as_secs(), "Cache sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.clear_expired();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
