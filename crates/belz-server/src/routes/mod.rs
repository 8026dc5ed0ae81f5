//! Route configuration for the Belz API server.

pub mod auth;
pub mod extract;
pub mod health;
pub mod proposals;
pub mod solicitacoes;
pub mod users;

use crate::{error::ApiError, state::AppState, store::Record};
use axum::{
    routing::{get, patch, post},
    Router,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router.
///
/// The CORS/security envelope is not applied here; see [`crate::app`].
pub fn create_router(state: AppState) -> Router {
    let timeout = state.config().server.request_timeout();

    // Common middleware stack applied to all routes
    let common_middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(timeout));

    Router::new()
        .nest("/api", api_routes())
        .fallback(fallback_handler)
        .layer(common_middleware)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Public
        .route("/health", get(health::health_check))
        .route("/auth/login", post(auth::login))
        // Authenticated
        .route("/auth/renew", get(auth::renew))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/proposals",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route("/proposals/events", get(proposals::events))
        .route(
            "/proposals/:id",
            patch(proposals::update_proposal).delete(proposals::delete_proposal),
        )
        .route(
            "/solicitacoes",
            get(solicitacoes::list_solicitacoes).post(solicitacoes::create_solicitacao),
        )
}

async fn fallback_handler() -> ApiError {
    ApiError::NotFound("route".to_string())
}

/// String field of a record.
pub(crate) fn field_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Object payload as a record; anything else yields an empty record.
pub(crate) fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
