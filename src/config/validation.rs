//! Configuration validation.
//!
//! Serde handles syntax; this pass checks URLs, templates and value ranges and
//! reports every problem at once.

use std::fmt;
use url::Url;

use crate::config::schema::{GatewayConfig, GeocodeSchema};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn check_url(field: &str, raw: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{raw}': {e}"))),
    }
}

fn check_positive(field: &str, value: u64, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.user_agent.trim().is_empty() {
        errors.push(ValidationError::new(
            "client.user_agent",
            "a client identifier is required by the geocoding provider",
        ));
    }

    let mut geocoders = vec![("geocoding.primary", &config.geocoding.primary)];
    if let Some(fallback) = &config.geocoding.fallback {
        geocoders.push(("geocoding.fallback", fallback));
    }
    for (field, endpoint) in geocoders {
        check_url(&format!("{field}.base_url"), &endpoint.base_url, &mut errors);
        if endpoint.schema == GeocodeSchema::Pelias && endpoint.api_key.is_none() {
            errors.push(ValidationError::new(
                format!("{field}.api_key"),
                "pelias endpoints require an API key",
            ));
        }
    }

    check_url(
        "routing.primary.base_url",
        &config.routing.primary.base_url,
        &mut errors,
    );
    if let Some(fallback) = &config.routing.fallback {
        check_url("routing.fallback.base_url", &fallback.base_url, &mut errors);
    }

    let mut tiles = vec![("tiles.primary", &config.tiles.primary)];
    if let Some(fallback) = &config.tiles.fallback {
        tiles.push(("tiles.fallback", fallback));
    }
    for (field, endpoint) in tiles {
        let template = &endpoint.url_template;
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                errors.push(ValidationError::new(
                    format!("{field}.url_template"),
                    format!("missing {placeholder} placeholder"),
                ));
            }
        }
        let probe = template
            .replace("{z}", "0")
            .replace("{x}", "0")
            .replace("{y}", "0");
        check_url(&format!("{field}.url_template"), &probe, &mut errors);
    }
    if config.tiles.max_zoom > 22 {
        errors.push(ValidationError::new("tiles.max_zoom", "must be at most 22"));
    }

    check_positive("timeouts.request_ms", config.timeouts.request_ms, &mut errors);
    check_positive("cache.tile_ttl_secs", config.cache.tile_ttl_secs, &mut errors);
    check_positive("cache.geocode_ttl_secs", config.cache.geocode_ttl_secs, &mut errors);
    check_positive("cache.route_ttl_secs", config.cache.route_ttl_secs, &mut errors);

    for (provider, policy) in &config.rate_limits {
        check_positive(
            &format!("rate_limits.{provider}.max_requests"),
            u64::from(policy.max_requests),
            &mut errors,
        );
        check_positive(
            &format!("rate_limits.{provider}.window_ms"),
            policy.window_ms,
            &mut errors,
        );
    }

    let fare = &config.fare;
    for (field, value) in [
        ("fare.base_fare", fare.base_fare),
        ("fare.per_km", fare.per_km),
        ("fare.per_minute", fare.per_minute),
        ("fare.minimum_fare", fare.minimum_fare),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(ValidationError::new(field, "must be a non-negative number"));
        }
    }

    if config.estimate.detour_factor < 1.0 {
        errors.push(ValidationError::new("estimate.detour_factor", "must be at least 1.0"));
    }
    if !(config.estimate.average_speed_kmh > 0.0) {
        errors.push(ValidationError::new(
            "estimate.average_speed_kmh",
            "must be greater than zero",
        ));
    }

    if config.connectivity.probe_hosts.is_empty() {
        errors.push(ValidationError::new(
            "connectivity.probe_hosts",
            "at least one probe host is required",
        ));
    }
    check_positive(
        "connectivity.probe_timeout_ms",
        config.connectivity.probe_timeout_ms,
        &mut errors,
    );

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
