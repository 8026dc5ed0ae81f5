//! Belz Server Binary

use anyhow::Result;
use belz_server::{
    logging::init_tracing,
    middleware::authz::Role,
    store::{seed_user, InMemoryStore, NewUser},
    AppState, Server, ServerConfig,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Seed account for the in-memory store, outside production only.
const SEED_ADMIN_EMAIL: &str = "SEED_ADMIN_EMAIL";
const SEED_ADMIN_PASSWORD: &str = "SEED_ADMIN_PASSWORD";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging)?;

    info!(
        "Starting Belz Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = Arc::new(InMemoryStore::new());
    if !config.environment.is_production() {
        seed_admin(&store).await?;
    }

    let state = AppState::new(config, store)?;
    let server = Server::new(state)?;
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn seed_admin(store: &InMemoryStore) -> Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var(SEED_ADMIN_EMAIL),
        std::env::var(SEED_ADMIN_PASSWORD),
    ) else {
        warn!("No seed account configured; the in-memory store starts empty");
        return Ok(());
    };

    seed_user(store, NewUser::new("Administrador", email, password, Role::Gestor)).await?;
    Ok(())
}
