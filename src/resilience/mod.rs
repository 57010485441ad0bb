//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider client (cache miss, online, within rate budget):
//!     → fallback.rs FallbackCoordinator::execute(op, primary, fallback)
//!         → timeouts.rs (deadline per tier)
//!         → health registry (primary_<op> / fallback_<op> outcome)
//!     → value, the primary error, or Exhausted { primary, fallback }
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Exactly one fallback hop, no same-tier retry
//! - Only recoverable errors escalate to the fallback tier

pub mod fallback;
pub mod timeouts;

pub use fallback::FallbackCoordinator;
