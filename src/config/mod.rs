//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides for API keys)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to GeoGateway::new at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the gateway is built
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, ClientConfig, ConnectivityConfig, FallbackConfig, FareConfig, GatewayConfig,
    GeocodeSchema, GeocodingConfig, GeocodingEndpoint, LocalEstimateConfig, ObservabilityConfig,
    RateLimitPolicy, RouteSchema, RoutingConfig, RoutingEndpoint, TileConfig, TileEndpoint,
    TimeoutConfig,
};
