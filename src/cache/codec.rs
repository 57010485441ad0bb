//! Byte codec between cache entries and the key-value store.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::entry::CacheEntry;
use crate::error::{GeoError, GeoResult};

pub fn encode_entry<V: Serialize>(entry: &CacheEntry<V>) -> GeoResult<Vec<u8>> {
    serde_json::to_vec(entry)
        .map_err(|e| GeoError::Cache(format!("failed to encode '{}': {e}", entry.key)))
}

pub fn decode_entry<V: DeserializeOwned>(bytes: &[u8]) -> GeoResult<CacheEntry<V>> {
    serde_json::from_slice(bytes).map_err(|e| GeoError::Cache(format!("corrupt cache record: {e}")))
}

/// Serde adapter storing byte payloads as standard base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
