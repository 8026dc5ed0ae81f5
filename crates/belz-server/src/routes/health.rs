//! Health check.

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// GET /api/health
///
/// 200 while the store answers, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .store()
        .ping()
        .await
        .map_err(|err| ApiError::ServiceUnavailable(err.to_string()))?;

    Ok(Json(json!({
        "ok": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
