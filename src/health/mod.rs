//! Provider health subsystem.
//!
//! # Data Flow
//! ```text
//! FallbackCoordinator outcome
//!     → registry.rs (record_success / record_failure under primary_<op> / fallback_<op>)
//!     → state.rs (success rate, latency, failure streak, derived state)
//!
//! Offline skip (provider clients):
//!     → registry.rs record_skipped (not a failure)
//! ```
//!
//! # Design Decisions
//! - Health is per provider tier and operation, not global
//! - Availability needs both a low success rate and a failure streak
//! - Manual overrides win until reset

pub mod registry;
pub mod state;

pub use registry::ServiceHealthRegistry;
pub use state::{HealthState, ServiceHealth};
