//! Configuration loading utilities.

use super::types::{Environment, ServerConfig};
use anyhow::{Context, Result};
use belz_common_secret::SecretString;
use std::path::Path;
use tracing::{info, warn};

/// Variables understood for compatibility with the previous deployment.
pub mod legacy_vars {
    /// Signing secret for access tokens.
    pub const JWT_SECRET: &str = "JWT_SECRET";
    /// Comma-separated list of allowed CORS origins.
    pub const CORS_ORIGINS: &str = "CORS_ORIGINS";
    /// `development` or `production`.
    pub const APP_ENV: &str = "APP_ENV";
    /// Path to a TOML file layered over the defaults.
    pub const CONFIG_PATH: &str = "CONFIG_PATH";
    /// Milliseconds.
    pub const RATE_LIMIT_WINDOW: &str = "RATE_LIMIT_WINDOW";
    /// Attempts allowed per window.
    pub const RATE_LIMIT_MAX_REQUESTS: &str = "RATE_LIMIT_MAX_REQUESTS";
}

/// Load configuration from various sources.
pub struct ConfigLoader {
    config_path: Option<String>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader with the `BELZ` environment prefix and no config file.
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "BELZ".to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration.
    pub fn load(&self) -> Result<ServerConfig> {
        let mut builder = ::config::Config::builder();

        builder = builder.add_source(::config::File::from_str(
            include_str!("defaults.toml"),
            ::config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if Path::new(path).exists() {
                info!(path = %path, "Loading config file");
                builder = builder.add_source(::config::File::with_name(path));
            } else {
                warn!(path = %path, "Config file not found, skipping");
            }
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .with_list_parse_key("auth.session_cookies")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        let mut server_config: ServerConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        apply_legacy_env(&mut server_config, |var| std::env::var(var).ok());

        Ok(server_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay the unprefixed variables of the previous deployment.
///
/// They win over the layered sources so an existing `.env` keeps working.
pub fn apply_legacy_env<F>(config: &mut ServerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(legacy_vars::JWT_SECRET).filter(|s| !s.trim().is_empty()) {
        config.auth.jwt_secret = Some(SecretString::new(secret));
    }

    if let Some(origins) = lookup(legacy_vars::CORS_ORIGINS) {
        let parsed = parse_origin_list(&origins);
        if !parsed.is_empty() {
            config.cors.allowed_origins = parsed;
        }
    }

    if let Some(millis) =
        lookup(legacy_vars::RATE_LIMIT_WINDOW).and_then(|v| v.trim().parse::<u64>().ok())
    {
        config.rate_limit.window_secs = (millis / 1000).max(1);
    }

    if let Some(max) =
        lookup(legacy_vars::RATE_LIMIT_MAX_REQUESTS).and_then(|v| v.trim().parse().ok())
    {
        config.rate_limit.max_attempts = max;
    }

    if let Some(value) = lookup(legacy_vars::APP_ENV) {
        match Environment::parse(&value) {
            Some(environment) => config.environment = environment,
            None => warn!(value = %value, "Ignoring unknown APP_ENV value"),
        }
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origin_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Load configuration from environment.
pub fn load_config() -> Result<ServerConfig> {
    let mut loader = ConfigLoader::new();
    if let Ok(path) = std::env::var(legacy_vars::CONFIG_PATH) {
        loader = loader.with_config_path(path);
    }

    loader.load()
}
