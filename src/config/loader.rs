//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Primary routing API key.
pub const ROUTING_API_KEY_ENV_VAR: &str = "GEO_GATEWAY_ROUTING_API_KEY";
/// Fallback routing API key.
pub const ROUTING_FALLBACK_API_KEY_ENV_VAR: &str = "GEO_GATEWAY_ROUTING_FALLBACK_API_KEY";
/// Fallback geocoding API key.
pub const GEOCODING_FALLBACK_API_KEY_ENV_VAR: &str = "GEO_GATEWAY_GEOCODING_FALLBACK_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fill API keys from the environment. A set env var replaces the file value.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(key) = lookup(ROUTING_API_KEY_ENV_VAR) {
        config.routing.primary.api_key = Some(key);
    }
    if let (Some(fallback), Some(key)) = (
        config.routing.fallback.as_mut(),
        lookup(ROUTING_FALLBACK_API_KEY_ENV_VAR),
    ) {
        fallback.api_key = Some(key);
    }
    if let (Some(fallback), Some(key)) = (
        config.geocoding.fallback.as_mut(),
        lookup(GEOCODING_FALLBACK_API_KEY_ENV_VAR),
    ) {
        fallback.api_key = Some(key);
    }
}

/// Parse, apply env overrides and validate a TOML document.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}
