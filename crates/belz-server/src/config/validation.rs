//! Configuration validation.

use super::types::ServerConfig;
use thiserror::Error;

/// Minimum signing secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Longest access token lifetime accepted (30 days).
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// A configuration problem that prevents startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No signing secret in production.
    #[error("JWT secret is required in production")]
    MissingJwtSecret,

    /// Signing secret shorter than [`MIN_PRODUCTION_SECRET_LEN`].
    #[error("Invalid JWT secret: must be at least 32 characters in production")]
    WeakJwtSecret,

    /// Port the server cannot bind.
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    /// Zero or longer than [`MAX_TOKEN_TTL_SECS`].
    #[error("Access token lifetime must be between 1 second and 30 days")]
    InvalidTokenTtl,

    /// Blank or whitespace-containing allow-list entry.
    #[error("Invalid CORS origin: {0:?}")]
    InvalidCorsOrigin(String),

    /// Unknown log level.
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Neither `pretty` nor `json`.
    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    /// Zero event channel capacity.
    #[error("Event channel capacity must be greater than zero")]
    InvalidEventCapacity,

    /// Zero attempts or a zero window.
    #[error("Rate limit needs at least one attempt per non-empty window")]
    InvalidRateLimit,
}

/// Validate server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.environment.is_production() {
        match &config.auth.jwt_secret {
            None => errors.push(ConfigError::MissingJwtSecret),
            Some(secret) if secret.is_blank() => errors.push(ConfigError::MissingJwtSecret),
            Some(secret) if secret.len() < MIN_PRODUCTION_SECRET_LEN => {
                errors.push(ConfigError::WeakJwtSecret)
            }
            Some(_) => {}
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    if !(1..=MAX_TOKEN_TTL_SECS).contains(&config.auth.access_token_ttl_secs) {
        errors.push(ConfigError::InvalidTokenTtl);
    }

    for origin in &config.cors.allowed_origins {
        if origin.trim().is_empty() || origin.contains(char::is_whitespace) {
            errors.push(ConfigError::InvalidCorsOrigin(origin.clone()));
        }
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    let valid_formats = ["pretty", "json"];
    if !valid_formats.contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogFormat(config.logging.format.clone()));
    }

    if config.events.channel_capacity == 0 {
        errors.push(ConfigError::InvalidEventCapacity);
    }

    if config.rate_limit.max_attempts == 0 || config.rate_limit.window_secs == 0 {
        errors.push(ConfigError::InvalidRateLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
