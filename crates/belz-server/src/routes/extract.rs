//! Request body extraction.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use belz_common_secret::sanitize_for_log;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use validator::Validate;

/// JSON body that is deserialized and then validated.
///
/// Malformed JSON and validation failures both become a 400 in the usual
/// error body. The body is logged at debug level with credentials redacted.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        debug!(body = %sanitize_for_log(&raw), "Request body");

        let value: T = serde_json::from_value(raw)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?;
        value.validate()?;

        Ok(ValidJson(value))
    }
}
