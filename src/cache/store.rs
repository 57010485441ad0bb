//! Key-value persistence behind the response cache.
//!
//! The cache keeps decoded entries in memory and writes encoded bytes
//! through to a [`CacheStore`]. On startup every record of a kind is read
//! back once to warm the in-memory map.

use dashmap::DashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cache::entry::CacheKind;
use crate::error::{GeoError, GeoResult};

/// Byte-oriented storage of cache records, namespaced by kind.
pub trait CacheStore: Send + Sync + Debug {
    fn load_all(&self, kind: CacheKind) -> GeoResult<Vec<(String, Vec<u8>)>>;
    fn put(&self, kind: CacheKind, key: &str, bytes: &[u8]) -> GeoResult<()>;
    fn remove(&self, kind: CacheKind, key: &str) -> GeoResult<()>;
    fn clear(&self, kind: CacheKind) -> GeoResult<()>;
}

/// Non-persistent store. Used when no cache directory is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(CacheKind, String), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn load_all(&self, kind: CacheKind) -> GeoResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.key().0 == kind)
            .map(|r| (r.key().1.clone(), r.value().clone()))
            .collect())
    }

    fn put(&self, kind: CacheKind, key: &str, bytes: &[u8]) -> GeoResult<()> {
        self.records.insert((kind, key.to_string()), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, kind: CacheKind, key: &str) -> GeoResult<()> {
        self.records.remove(&(kind, key.to_string()));
        Ok(())
    }

    fn clear(&self, kind: CacheKind) -> GeoResult<()> {
        self.records.retain(|(k, _), _| *k != kind);
        Ok(())
    }
}

/// One JSON file per record under `<root>/<kind>/<hex(key)>.json`.
///
/// Keys are hex-encoded so arbitrary query text maps to a safe file name.
/// Writes go to a `.tmp` sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> GeoResult<Self> {
        let root = root.into();
        for kind in CacheKind::ALL {
            fs::create_dir_all(root.join(kind.as_str())).map_err(|e| io_error(&root, e))?;
        }
        tracing::info!(path = %root.display(), "Opened cache directory");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, kind: CacheKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    fn record_path(&self, kind: CacheKind, key: &str) -> PathBuf {
        self.dir(kind).join(format!("{}.json", hex::encode(key)))
    }
}

impl CacheStore for FileStore {
    fn load_all(&self, kind: CacheKind) -> GeoResult<Vec<(String, Vec<u8>)>> {
        let dir = self.dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&dir, e))?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| hex::decode(s).ok())
                .and_then(|raw| String::from_utf8(raw).ok())
            else {
                tracing::warn!(path = %path.display(), "Skipping cache file with unrecognised name");
                continue;
            };
            match fs::read(&path) {
                Ok(bytes) => records.push((key, bytes)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read cache file")
                }
            }
        }
        Ok(records)
    }

    fn put(&self, kind: CacheKind, key: &str, bytes: &[u8]) -> GeoResult<()> {
        let path = self.record_path(kind, key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
        file.write_all(bytes).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn remove(&self, kind: CacheKind, key: &str) -> GeoResult<()> {
        let path = self.record_path(kind, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn clear(&self, kind: CacheKind) -> GeoResult<()> {
        let dir = self.dir(kind);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&dir, e)),
        }
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))
    }
}

fn io_error(path: &Path, e: io::Error) -> GeoError {
    GeoError::Cache(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_namespaces() {
        let store = MemoryStore::new();
        store.put(CacheKind::Tile, "a", b"tile").unwrap();
        store.put(CacheKind::Route, "a", b"route").unwrap();

        let tiles = store.load_all(CacheKind::Tile).unwrap();
        assert_eq!(tiles, vec![("a".to_string(), b"tile".to_vec())]);

        store.clear(CacheKind::Tile).unwrap();
        assert!(store.load_all(CacheKind::Tile).unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let key = "mg road, bengaluru@12.97,77.59";

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put(CacheKind::Geocode, key, b"{}").unwrap();
            store.put(CacheKind::Geocode, "other", b"[]").unwrap();
            store.remove(CacheKind::Geocode, "other").unwrap();
            store.remove(CacheKind::Geocode, "missing").unwrap();
        }

        let reopened = FileStore::open(dir.path()).unwrap();
        let records = reopened.load_all(CacheKind::Geocode).unwrap();
        assert_eq!(records, vec![(key.to_string(), b"{}".to_vec())]);
        assert!(reopened.load_all(CacheKind::Tile).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_clear_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put(CacheKind::Route, "r", b"x").unwrap();
        std::fs::write(dir.path().join("route").join("zz-not-hex.json"), b"x").unwrap();
        std::fs::write(dir.path().join("route").join("notes.txt"), b"x").unwrap();

        assert_eq!(store.load_all(CacheKind::Route).unwrap().len(), 1);

        store.clear(CacheKind::Route).unwrap();
        assert!(store.load_all(CacheKind::Route).unwrap().is_empty());
    }
}
