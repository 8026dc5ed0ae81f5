//! Header envelope applied to every outgoing response.

use super::config::{CorsPolicy, ALLOWED_HEADERS, ALLOWED_METHODS};
use crate::config::Environment;
use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Apply CORS and security headers to `response` and return it.
pub fn handle_cors(mut response: Response, policy: &CorsPolicy, origin: Option<&str>) -> Response {
    apply_envelope(response.headers_mut(), policy, origin);
    response
}

/// Mutate `headers` with the CORS decision for `origin` and the baseline
/// security headers. Idempotent.
pub fn apply_envelope(headers: &mut HeaderMap, policy: &CorsPolicy, origin: Option<&str>) {
    let allowed_origin = origin
        .filter(|o| policy.is_origin_allowed(o))
        .and_then(|o| HeaderValue::from_str(o).ok());

    if let Some(value) = allowed_origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    if policy.allow_credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(policy.max_age.as_secs()),
    );

    apply_security_headers(headers, policy.environment);
}

/// Baseline security headers, set regardless of the CORS decision.
pub fn apply_security_headers(headers: &mut HeaderMap, environment: Environment) {
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        PERMISSIONS_POLICY,
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );

    if environment.is_production() {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
}
