//! Catalog API - categories, products with images, and reviews over REST

use axum_helpers::server::{create_production_app, health_router};
use core_config::FromEnv;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::RetryConfig;
use database::postgres::{connect_from_config_with_retry, run_migrations};
use domain_catalog::LocalMediaStorage;
use migration::Migrator;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to PostgreSQL");
    let retry = RetryConfig::from_env()?;
    let db = connect_from_config_with_retry(config.database.clone(), Some(retry))
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    run_migrations::<Migrator>(&db, config.app.name).await?;

    tokio::fs::create_dir_all(&config.media.root).await?;
    info!(root = %config.media.root.display(), url = %config.media.url, "Media storage ready");

    let media = Arc::new(LocalMediaStorage::new(
        &config.media.root,
        config.media.url.clone(),
    ));

    let state = AppState { config, db, media };

    // Build REST router; create_router nests it under /api
    let api_routes = api::routes(&state);
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    let mut app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()));

    if let Some(path) = state.config.media.serve_path() {
        app = app.nest_service(path, ServeDir::new(&state.config.media.root));
    }

    let server = state.config.server.clone();
    info!("Starting Catalog API on port {}", server.port);

    create_production_app(
        app,
        &server,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: closing database connections");
            match state.db.close().await {
                Ok(_) => info!("PostgreSQL connection closed successfully"),
                Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
            }
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Catalog API shutdown complete");
    Ok(())
}
