//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! GeoGateway::spawn_background_tasks(&Shutdown)
//!     → connectivity probe loop + cache sweep loop, each with a receiver
//!
//! signals.rs (SIGINT / SIGTERM)
//!     → Shutdown::trigger → every loop exits at its next select
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
