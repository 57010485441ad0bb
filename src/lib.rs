//! Resilient access to geocoding, routing and map tile providers.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ GeoGateway
//!               │
//!               ├─ GeocodingClient ─┐
//!               ├─ TileClient ──────┤
//!               └─ HybridRouteOrchestrator ── RoutingClient ─┤
//!                                                            ▼
//!              ┌──────────────────────── ProviderContext ─────────────────────────┐
//!              │ ResponseCache ─▶ OfflineGate ─▶ FallbackCoordinator ─▶ write-back │
//!              │   (TTL maps)      (online?)       primary ─▶ fallback            │
//!              │                                    │ RateLimiter (per provider)  │
//!              │                                    │ ServiceHealthRegistry       │
//!              │                                    │ AnalyticsTracker            │
//!              └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fares always resolve: estimators first, then the local formula.

pub mod cache;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod health;
pub mod lifecycle;
pub mod limits;
pub mod observability;
pub mod orchestrator;
pub mod providers;
pub mod resilience;
pub mod types;

pub use config::GatewayConfig;
pub use error::{GeoError, GeoResult};
pub use gateway::GeoGateway;
pub use lifecycle::Shutdown;
