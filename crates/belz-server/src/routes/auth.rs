//! Login, session and token renewal endpoints.

use super::{extract::ValidJson, field_str, into_record};
use crate::{
    error::{ApiError, ApiResult},
    middleware::{
        auth::{verify_dummy_password, verify_password, Auth, Principal},
        authz::Role,
        rate_limit::client_key,
    },
    state::AppState,
    store::{public_user, Collection},
};
use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use belz_common_secret::SecretString;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Login email; matched case-insensitively.
    #[validate(email)]
    pub email: String,
    /// Plain password; never logged.
    #[validate(custom(function = "not_blank"))]
    pub senha: SecretString,
}

fn not_blank(senha: &SecretString) -> Result<(), ValidationError> {
    if senha.is_blank() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Optional body of `POST /api/auth/logout`.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    /// Session to revoke, if the client tracks one.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// POST /api/auth/login
///
/// Throttled per client address and email. When session cookies are
/// configured the token is also set in each of them.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let email = req.email.trim().to_lowercase();
    state
        .limiter()
        .enforce(&format!("login:{}:{}", client_key(&headers), email))?;

    let user = state
        .store()
        .find_one(Collection::Usuarios, "email", &Value::String(email.clone()))
        .await?;

    let Some(user) = user else {
        verify_dummy_password(req.senha.expose());
        warn!(email = %email, reason = "unknown_user", "Login rejected");
        return Err(ApiError::InvalidCredentials);
    };

    let hash = field_str(&user, "senha_hash").unwrap_or_default();
    if !verify_password(req.senha.expose(), hash) {
        warn!(email = %email, reason = "bad_password", "Login rejected");
        return Err(ApiError::InvalidCredentials);
    }
    if user.get("ativo") == Some(&Value::Bool(false)) {
        warn!(email = %email, reason = "inactive", "Login rejected");
        return Err(ApiError::InvalidCredentials);
    }

    let id = field_str(&user, "id")
        .ok_or_else(|| anyhow::anyhow!("user row without id"))?
        .to_string();
    let role: Role = field_str(&user, "tipo_usuario")
        .unwrap_or_default()
        .parse()
        .map_err(anyhow::Error::new)?;

    let principal = Principal::new(id, email, role);
    let token = state.codec().issue(&principal)?;

    let session = state
        .store()
        .insert(
            Collection::Sessoes,
            into_record(json!({
                "usuario_id": principal.id,
                "data_login": Utc::now().to_rfc3339(),
                "ativo": true,
            })),
        )
        .await?;

    info!(user_id = %principal.id, role = %principal.role, "User logged in");

    let jar = set_session_cookies(jar, &state, &token);
    let body = Json(json!({
        "user": public_user(user),
        "token": token,
        "sessionId": session.get("id"),
        "expiresIn": state.codec().ttl().as_secs(),
    }));
    Ok((jar, body))
}

/// Session cookies carry no expiry; they end with the browser session.
fn set_session_cookies(jar: CookieJar, state: &AppState, token: &str) -> CookieJar {
    let secure = state.config().environment.is_production();

    state
        .config()
        .auth
        .session_cookies
        .iter()
        .fold(jar, |jar, name| {
            jar.add(
                Cookie::build((name.clone(), token.to_string()))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .secure(secure),
            )
        })
}

fn clear_session_cookies(jar: CookieJar, state: &AppState) -> CookieJar {
    state
        .config()
        .auth
        .session_cookies
        .iter()
        .fold(jar, |jar, name| {
            let mut cookie = Cookie::build((name.clone(), String::new()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            cookie.make_removal();
            jar.add(cookie)
        })
}

/// GET /api/auth/renew
///
/// Re-issues a token for the current principal without a credential check.
pub async fn renew(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<Json<Value>> {
    let token = state.codec().renew(&principal)?;
    Ok(Json(json!({ "token": token })))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, Auth(principal): Auth) -> ApiResult<Json<Value>> {
    let user = state
        .store()
        .get(Collection::Usuarios, &principal.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user".to_string()))?;

    Ok(Json(json!({ "user": public_user(user) })))
}

/// POST /api/auth/logout
///
/// Closes the named session when it belongs to the caller and expires the
/// session cookies. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    Auth(principal): Auth,
    jar: CookieJar,
    body: Option<Json<LogoutRequest>>,
) -> (CookieJar, Json<Value>) {
    let Json(req) = body.unwrap_or_default();

    if let Some(session_id) = req.session_id.filter(|id| !id.is_empty()) {
        if let Err(err) = close_session(&state, &principal, &session_id).await {
            warn!(session_id = %session_id, error = %err, "Failed to close session");
        }
    }

    info!(user_id = %principal.id, "User logged out");
    (clear_session_cookies(jar, &state), Json(json!({ "success": true })))
}

async fn close_session(
    state: &AppState,
    principal: &Principal,
    session_id: &str,
) -> ApiResult<()> {
    let Some(session) = state.store().get(Collection::Sessoes, session_id).await? else {
        return Ok(());
    };
    if field_str(&session, "usuario_id") != Some(principal.id.as_str()) {
        return Ok(());
    }

    state
        .store()
        .update(
            Collection::Sessoes,
            session_id,
            into_record(json!({
                "ativo": false,
                "data_logout": Utc::now().to_rfc3339(),
            })),
        )
        .await?;
    Ok(())
}
