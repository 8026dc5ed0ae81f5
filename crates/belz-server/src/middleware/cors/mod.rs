//! CORS and security-header envelope.

pub mod config;
pub mod envelope;
pub mod layer;

pub use self::config::{CorsPolicy, ALLOWED_HEADERS, ALLOWED_METHODS};
pub use envelope::{apply_envelope, apply_security_headers, handle_cors};
pub use layer::{EnvelopeLayer, EnvelopeMiddleware};
