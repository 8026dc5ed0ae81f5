//! JWT issuing and verification.

use super::types::{Claims, Principal};
use crate::config::{ConfigError, ServerConfig};
use belz_common_secret::SecretString;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Why a token was not accepted.
///
/// The distinction is for logs only; callers reject every variant the same way.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature does not match the configured secret.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// `exp` is in the past.
    #[error("token has expired")]
    Expired,

    /// Not a well-formed JWT, or the claims do not parse.
    #[error("token is malformed")]
    Malformed,

    /// Encoding failed while issuing a token.
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::Malformed => "malformed",
            Self::Signing(_) => "signing",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed,
        }
    }
}

/// Issues and verifies signed, time-limited identity tokens.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec for an HMAC secret and token lifetime.
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.expose().as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.expose().as_bytes()),
            validation,
            ttl,
        }
    }

    /// Build the codec from configuration.
    ///
    /// Production refuses to start without a secret. Elsewhere a random
    /// per-process secret is generated, so tokens do not survive a restart.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let ttl = config.auth.access_token_ttl();

        match config.auth.jwt_secret.as_ref().filter(|s| !s.is_blank()) {
            Some(secret) => Ok(Self::new(secret, ttl)),
            None if config.environment.is_production() => Err(ConfigError::MissingJwtSecret),
            None => {
                warn!(
                    environment = config.environment.as_str(),
                    "No JWT secret configured, using an ephemeral per-process secret"
                );
                Ok(Self::new(&ephemeral_secret(), ttl))
            }
        }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `principal`, valid from now for the configured lifetime.
    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_at(principal, Utc::now().timestamp())
    }

    /// Issue a token as if it had been issued at `issued_at` (unix seconds).
    pub fn issue_at(&self, principal: &Principal, issued_at: i64) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims::for_principal(principal, issued_at, ttl_secs);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Re-issue a fresh token for an already authenticated principal.
    ///
    /// Credentials are not re-checked: this slides the session forward.
    pub fn renew(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue(principal)
    }

    /// Validate signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

fn ephemeral_secret() -> SecretString {
    SecretString::new(format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    ))
}
