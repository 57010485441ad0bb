//! Request budgets and usage accounting.
//!
//! # Data Flow
//! ```text
//! Provider client, before a network call:
//!     → rate_limit.rs try_acquire (sliding window + quota, rejects locally)
//! After the call:
//!     → analytics.rs record_call / cache hit-miss counters
//! ```

pub mod analytics;
pub mod rate_limit;

pub use analytics::{AnalyticsSummary, AnalyticsTracker, CacheUsage, ServiceStats};
pub use rate_limit::RateLimiter;
