//! Middleware for the Belz API server.

pub mod auth;
pub mod authz;
pub mod cors;
pub mod rate_limit;

pub use auth::{Auth, AuthGate, AuthRejection, Principal, TokenCodec};
pub use authz::{log_authz, Capability, PermissionTable, Role};
pub use cors::{handle_cors, CorsPolicy, EnvelopeLayer, EnvelopeMiddleware};
pub use rate_limit::{client_key, RateLimiter};
