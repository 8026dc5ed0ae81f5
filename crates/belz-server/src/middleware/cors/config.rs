//! CORS policy.

use crate::config::{Environment, ServerConfig};
use std::collections::HashSet;
use std::time::Duration;

/// Methods advertised on every response.
pub const ALLOWED_METHODS: &str = "GET, POST, PATCH, DELETE, OPTIONS";

/// Request headers advertised on every response.
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Per-process CORS policy, read-only after startup.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    /// Origins echoed back in production.
    pub allowed_origins: HashSet<String>,
    /// Outside production every origin is echoed.
    pub environment: Environment,
    /// Allow credentials (cookies, auth headers).
    pub allow_credentials: bool,
    /// Max age for preflight cache.
    pub max_age: Duration,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: ["http://localhost:3000".to_string()].into_iter().collect(),
            environment: Environment::Development,
            allow_credentials: true,
            max_age: Duration::from_secs(86400), // 24 hours
        }
    }
}

impl CorsPolicy {
    /// Policy built from the `cors` section and the environment.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            allowed_origins: config.cors.allowed_origins.iter().cloned().collect(),
            environment: config.environment,
            allow_credentials: true,
            max_age: Duration::from_secs(config.cors.max_age_secs),
        }
    }

    /// Replace the allow-list.
    pub fn with_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Override the environment the policy checks against.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Whether `origin` is echoed in `Access-Control-Allow-Origin`.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin) || !self.environment.is_production()
    }
}
