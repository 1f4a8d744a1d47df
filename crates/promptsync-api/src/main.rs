mod auth;
mod config;
mod error;
mod rate_limit;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use promptsync_core::SyncEngine;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("promptsync_api=info".parse().expect("valid directive"))
                .add_directive("promptsync_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting promptsync-api with config: {:?}", config);

    let stores = config.store.open()?;
    let engine = SyncEngine::from_stores(stores, config.sync_limits());

    let state = AppState::new(config, engine);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("promptsync-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
