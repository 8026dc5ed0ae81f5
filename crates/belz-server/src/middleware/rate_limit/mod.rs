//! Attempt throttling for login and proposal updates.

pub mod store;
pub mod types;

pub use store::{client_key, RateLimiter};
pub use types::{RateLimitResult, RateLimitState};
