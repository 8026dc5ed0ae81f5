//! API error types.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error enum covering all error cases.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    /// Malformed or invalid request body.
    #[error("{0}")]
    BadRequest(String),

    // 401 Unauthorized
    /// No bearer token (or session cookie) on the request.
    #[error("token required")]
    TokenRequired,

    /// Token failed verification; the reason is only logged.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Unknown email, wrong password or inactive account.
    #[error("invalid credentials")]
    InvalidCredentials,

    // 403 Forbidden
    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    // 404 Not Found
    /// The named thing does not exist.
    #[error("{0} not found")]
    NotFound(String),

    // 429 Too Many Requests
    /// Attempt budget exhausted; retry after the given seconds.
    #[error("too many attempts, try again later")]
    TooManyRequests {
        /// Seconds until the next attempt is accepted.
        retry_after: u64,
    },

    // 500 Internal Server Error
    /// Collaborator failure, message passed through.
    #[error("{0}")]
    Collaborator(String),

    /// Anything else; details are hidden in release builds.
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // 503 Service Unavailable
    /// A dependency is down.
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,

            Self::TokenRequired | Self::InvalidToken | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }

            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            Self::NotFound(_) => StatusCode::NOT_FOUND,

            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,

            Self::Collaborator(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::TokenRequired => "token_required",
            Self::InvalidToken => "invalid_token",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::TooManyRequests { .. } => "rate_limited",
            Self::Collaborator(_) => "collaborator_error",
            Self::Internal(_) => "internal_error",
            Self::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    /// Check if this is an authentication failure (401).
    pub fn is_auth_error(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }

    /// Check if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}
