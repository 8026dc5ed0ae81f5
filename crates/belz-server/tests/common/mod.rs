//! Common utilities for router-level tests.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use belz_server::{
    config::Environment,
    middleware::{auth::Principal, authz::Role},
    store::{seed_user, Collection, InMemoryStore, NewUser, Record, RecordStore},
    AppState, ServerConfig,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration_test_secret_0123456789abcdef";
pub const ALLOWED_ORIGIN: &str = "https://crm.belz.com.br";

/// Config used by every test unless overridden.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.environment = Environment::Test;
    config.auth.jwt_secret = Some(TEST_SECRET.into());
    config.cors.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config
}

/// Application state over an inspectable in-memory store.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn production() -> Self {
        let mut config = test_config();
        config.environment = Environment::Production;
        Self::with_config(config)
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, store.clone()).expect("Failed to build state");
        Self { store, state }
    }

    pub fn router(&self) -> Router {
        belz_server::app(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router().oneshot(req).await.expect("Router is infallible")
    }

    /// Bearer token for a synthetic user with `role`.
    pub fn token(&self, role: Role) -> String {
        self.state
            .codec()
            .issue(&principal(role))
            .expect("Failed to issue token")
    }

    pub fn bearer(&self, role: Role) -> String {
        format!("Bearer {}", self.token(role))
    }

    pub async fn seed_user(&self, email: &str, password: &str, role: Role) -> Record {
        seed_user(self.store.as_ref(), NewUser::new("Teste", email, password, role))
            .await
            .expect("Failed to seed user")
    }

    pub async fn insert(&self, collection: Collection, value: Value) -> Record {
        let Value::Object(record) = value else {
            panic!("expected a JSON object");
        };
        self.store
            .insert(collection, record)
            .await
            .expect("Failed to insert record")
    }
}

pub fn principal(role: Role) -> Principal {
    Principal::new(format!("u-{}", role), format!("{}@belz.com.br", role), role)
}

pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub fn get(uri: &str) -> Request<Body> {
    request(Method::GET, uri).body(Body::empty()).unwrap()
}

pub fn get_as(uri: &str, authorization: &str) -> Request<Body> {
    request(Method::GET, uri)
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, authorization: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = request(method, uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Headers every response must carry.
pub const SECURITY_HEADERS: [&str; 5] = [
    "x-content-type-options",
    "x-frame-options",
    "x-xss-protection",
    "referrer-policy",
    "permissions-policy",
];

pub fn assert_security_headers(response: &Response) {
    for name in SECURITY_HEADERS {
        assert!(
            response.headers().get(name).is_some(),
            "missing {name} on {} response",
            response.status()
        );
    }
}
