//! Authentication extractor for handlers.

use super::types::Principal;
use crate::{error::ApiError, state::AppState};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

/// Extractor for the authenticated principal (required).
///
/// Runs the auth gate; a failure short-circuits the handler with a 401.
pub struct Auth(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let principal = state.gate().require_auth(&parts.headers)?;
        Ok(Auth(principal))
    }
}
