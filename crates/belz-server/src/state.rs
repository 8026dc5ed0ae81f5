//! Shared application state.

use crate::{
    config::{ConfigError, ServerConfig},
    events::EventBus,
    middleware::{auth::AuthGate, authz::PermissionTable, RateLimiter, TokenCodec},
    store::{InMemoryStore, RecordStore},
};
use std::sync::Arc;

/// Process-wide state handed to every handler.
///
/// Built once at startup and read-only afterwards; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    codec: Arc<TokenCodec>,
    gate: AuthGate,
    permissions: PermissionTable,
    store: Arc<dyn RecordStore>,
    events: EventBus,
    limiter: RateLimiter,
}

impl AppState {
    /// Build state over the given store.
    ///
    /// Fails if no signing key can be established for this environment.
    pub fn new(config: ServerConfig, store: Arc<dyn RecordStore>) -> Result<Self, ConfigError> {
        let codec = Arc::new(TokenCodec::from_config(&config)?);
        let gate = AuthGate::new(codec.clone())
            .with_session_cookies(config.auth.session_cookies.clone());
        let events = EventBus::new(config.events.channel_capacity);
        let limiter = RateLimiter::new(config.rate_limit.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                codec,
                gate,
                permissions: PermissionTable::new(),
                store,
                events,
                limiter,
            }),
        })
    }

    /// State over an empty [`InMemoryStore`].
    pub fn in_memory(config: &ServerConfig) -> Result<Self, ConfigError> {
        Self::new(config.clone(), Arc::new(InMemoryStore::new()))
    }

    /// Configuration the state was built from.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Token codec shared with the gate.
    pub fn codec(&self) -> &TokenCodec {
        &self.inner.codec
    }

    /// Request authentication gate.
    pub fn gate(&self) -> &AuthGate {
        &self.inner.gate
    }

    /// Static role permission table.
    pub fn permissions(&self) -> &PermissionTable {
        &self.inner.permissions
    }

    /// Collaborator record store.
    pub fn store(&self) -> &dyn RecordStore {
        self.inner.store.as_ref()
    }

    /// Proposal update bus.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Attempt throttling for login and proposal updates.
    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }
}
