//! Rate limiting types.

use crate::config::RateLimitConfig;
use std::time::{Duration, Instant};

/// Token bucket for one key.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// Current token count.
    pub tokens: u32,
    /// Last refill timestamp.
    pub last_refill: Instant,
    /// Bucket size.
    pub max_tokens: u32,
    /// Refill rate (tokens per second).
    pub refill_rate: f64,
}

impl RateLimitState {
    /// A full bucket as of `now`.
    pub fn new(config: &RateLimitConfig, now: Instant) -> Self {
        let window = config.window().as_secs_f64().max(1.0);

        Self {
            tokens: config.max_attempts,
            last_refill: now,
            max_tokens: config.max_attempts,
            refill_rate: f64::from(config.max_attempts) / window,
        }
    }

    /// Refill tokens based on elapsed time.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let new_tokens = (elapsed.as_secs_f64() * self.refill_rate) as u32;

        if new_tokens > 0 {
            self.tokens = self.tokens.saturating_add(new_tokens).min(self.max_tokens);
            self.last_refill = now;
        }
    }

    /// Try to consume a token. Returns true if successful.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Whether the bucket has refilled completely by `now`.
    pub fn is_idle(&self, now: Instant) -> bool {
        let mut bucket = self.clone();
        bucket.refill(now);
        bucket.tokens >= bucket.max_tokens
    }

    /// Time until the next token is available.
    pub fn retry_after(&self) -> Duration {
        if self.tokens > 0 || self.refill_rate <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / self.refill_rate)
        }
    }
}

/// Outcome of one attempt.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    /// Whether the attempt may proceed.
    pub allowed: bool,
    /// Attempts per window.
    pub limit: u32,
    /// Attempts left right now.
    pub remaining: u32,
    /// Set when the attempt was refused.
    pub retry_after: Option<Duration>,
}
