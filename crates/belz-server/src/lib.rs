//! Belz CRM API Server
//!
//! HTTP API for the proposal and client-movement workflows of the Belz CRM.
//!
//! # Architecture
//!
//! Every request passes through the same gate before reaching data:
//!
//! - **Envelope**: CORS and security headers on every response; answers
//!   preflight requests directly
//! - **Auth gate**: bearer token to [`middleware::auth::Principal`], or 401
//! - **Permission table**: principal role × capability, or 403
//! - **Store**: the collaborator database behind [`store::RecordStore`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use middleware::cors::{CorsPolicy, EnvelopeLayer};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Full application: routes, common layers and the outermost envelope.
pub fn app(state: AppState) -> Router {
    let policy = CorsPolicy::from_config(state.config());
    routes::create_router(state).layer(EnvelopeLayer::new(policy))
}

/// Server builder for constructing and running the API server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server over the given state.
    ///
    /// Rejects invalid configuration, reporting every problem found.
    pub fn new(state: AppState) -> Result<Self, anyhow::Error> {
        let config = state.config().clone();
        if let Err(errors) = crate::config::validate_config(&config) {
            for err in &errors {
                error!(error = %err, "Invalid configuration");
            }
            anyhow::bail!("invalid configuration ({} problem(s))", errors.len());
        }

        Ok(Self { config, state })
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    /// Run the server, binding to the configured address.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr).await?;

        info!(
            environment = self.config.environment.as_str(),
            "Server listening on {}", addr
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the server's socket address.
    pub fn addr(&self) -> Result<SocketAddr, anyhow::Error> {
        Ok(self.config.socket_addr()?)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
