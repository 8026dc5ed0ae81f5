//! In-memory attempt throttling.

use super::types::{RateLimitResult, RateLimitState};
use crate::{config::RateLimitConfig, error::ApiError};
use axum::http::HeaderMap;
use dashmap::DashMap;
use std::time::Instant;
use tracing::warn;

/// Tracked keys before idle buckets are swept.
const SWEEP_THRESHOLD: usize = 10_000;

/// Per-key token buckets shared by every handler that throttles attempts.
///
/// Keys are namespaced by the caller (`login:<client>:<email>`,
/// `proposal-update:<user id>`), so one limiter serves all of them.
pub struct RateLimiter {
    states: DashMap<String, RateLimitState>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Limiter applying `config` to every key.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            states: DashMap::new(),
            config,
        }
    }

    /// Limits applied per key.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record an attempt for `key`.
    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        if self.states.len() > SWEEP_THRESHOLD {
            self.states.retain(|_, state| !state.is_idle(now));
        }

        let mut entry = self
            .states
            .entry(key.to_string())
            .or_insert_with(|| RateLimitState::new(&self.config, now));

        let state = entry.value_mut();
        let allowed = state.try_consume(now);

        RateLimitResult {
            allowed,
            limit: state.max_tokens,
            remaining: state.tokens,
            retry_after: if allowed { None } else { Some(state.retry_after()) },
        }
    }

    /// Record an attempt and refuse it with 429 once the key is exhausted.
    pub fn enforce(&self, key: &str) -> Result<RateLimitResult, ApiError> {
        let result = self.check(key);
        if result.allowed {
            return Ok(result);
        }

        let retry_after = result
            .retry_after
            .map(|d| (d.as_secs_f64().ceil() as u64).max(1))
            .unwrap_or(1);
        warn!(key = %key, retry_after, "Rate limit exceeded");
        Err(ApiError::TooManyRequests { retry_after })
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.states.len()
    }
}

/// Best-effort client address: `X-Forwarded-For`, then `X-Real-IP`.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}
