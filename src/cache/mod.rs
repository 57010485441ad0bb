//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Provider client:
//!     → keys.rs (normalized key for the request)
//!     → response.rs TtlMap::get (fresh hit returns without network)
//!     → on success: TtlMap::put
//!         → codec.rs (JSON, tile bytes as base64)
//!         → store.rs (memory, or one file per entry)
//!
//! Startup:
//!     store.rs load_all → codec.rs decode → TtlMap warm (corrupt records dropped)
//!
//! Background:
//!     ResponseCache::run_sweeper → clear_expired every sweep interval
//! ```
//!
//! # Design Decisions
//! - Three independent TTL maps (tiles, geocodes, routes)
//! - Expired entries are kept until swept so offline mode can serve them
//! - Persistence errors are logged and treated as misses

pub mod codec;
pub mod entry;
pub mod keys;
pub mod response;
pub mod store;

pub use entry::{CacheEntry, CacheKind};
pub use response::{CacheStats, KindStats, ResponseCache, TtlMap};
pub use store::{CacheStore, FileStore, MemoryStore};
