//! User administration.

use super::extract::ValidJson;
use crate::{
    error::{ApiError, ApiResult},
    middleware::{auth::Auth, authz::Capability},
    state::AppState,
    store::{public_user, Collection, NewUser},
};
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<Json<Vec<Value>>> {
    state.permissions().require(&principal, Capability::ManageUsers)?;

    let users = state
        .store()
        .list(Collection::Usuarios)
        .await?
        .into_iter()
        .map(|row| Value::Object(public_user(row)))
        .collect();

    Ok(Json(users))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Auth(principal): Auth,
    body: Result<ValidJson<NewUser>, ApiError>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.permissions().require(&principal, Capability::ManageUsers)?;
    let ValidJson(user) = body?;

    let email = user.normalized_email();
    let existing = state
        .store()
        .find_one(Collection::Usuarios, "email", &Value::String(email.clone()))
        .await?;
    if existing.is_some() {
        return Err(ApiError::BadRequest(format!("email already registered: {}", email)));
    }

    let row = state
        .store()
        .insert(Collection::Usuarios, user.into_record()?)
        .await?;

    info!(created_by = %principal.id, email = %email, "User created");
    Ok((StatusCode::CREATED, Json(json!({ "user": public_user(row) }))))
}
