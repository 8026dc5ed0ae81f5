//! The request authentication gate.

use super::{
    jwt::{TokenCodec, TokenError},
    types::Principal,
};
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a request was not authenticated.
#[derive(Debug)]
pub enum AuthRejection {
    /// No usable bearer token (or session cookie) on the request.
    MissingToken,
    /// A token was present but failed verification.
    InvalidToken(TokenError),
}

/// Turns request headers into a [`Principal`] or a rejection.
///
/// Performs no data access; the only inputs are the headers, the codec's
/// secret and the clock.
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    session_cookies: Arc<[String]>,
}

impl AuthGate {
    /// Gate that verifies bearer tokens with `codec`.
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            session_cookies: Arc::from(Vec::new()),
        }
    }

    /// Also accept the token from the first of these cookies present.
    pub fn with_session_cookies(mut self, names: Vec<String>) -> Self {
        self.session_cookies = Arc::from(names);
        self
    }

    /// The codec tokens are verified with.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Authenticate a request from its headers.
    pub fn require_auth(&self, headers: &HeaderMap) -> Result<Principal, AuthRejection> {
        let token = bearer_token(headers)
            .map(String::from)
            .or_else(|| cookie_token(headers, &self.session_cookies));

        let Some(token) = token else {
            warn!(reason = "missing_token", "Authentication rejected");
            return Err(AuthRejection::MissingToken);
        };

        match self.codec.verify(&token) {
            Ok(claims) => {
                let principal = Principal::from(claims);
                debug!(
                    user_id = %principal.id,
                    role = %principal.role,
                    "Authentication succeeded"
                );
                Ok(principal)
            }
            Err(err) => {
                warn!(reason = err.kind(), "Authentication rejected");
                Err(AuthRejection::InvalidToken(err))
            }
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// Any other scheme, or an empty token, counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn cookie_token(headers: &HeaderMap, names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }

    let jar = CookieJar::from_headers(headers);
    names
        .iter()
        .filter_map(|name| jar.get(name))
        .map(|cookie| cookie.value().to_string())
        .find(|value| !value.is_empty())
}
