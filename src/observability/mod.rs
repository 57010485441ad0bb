//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → stderr (pretty or JSON), keeping stdout for CLI output
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
