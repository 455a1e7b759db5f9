use axum_helpers::server::health_router;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_verses::{OpenAIProvider, PgVerseRepository, VerseService, handlers};
use migration::Migrator;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod health;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    database::postgres::run_migrations::<Migrator>(&db, config.app.name)
        .await
        .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;

    // The embedding provider is optional: without one, ingestion still
    // stores verses, just without embeddings.
    let repository = PgVerseRepository::new(db.clone());
    let service = match OpenAIProvider::from_env() {
        Ok(provider) => {
            info!("Embedding provider configured: openai");
            VerseService::with_embedding(repository, Arc::new(provider))
        }
        Err(e) => {
            warn!("No embedding provider ({}), ingestion will store verses without vectors", e);
            VerseService::new(repository)
        }
    };

    let api_routes = handlers::router(service);

    // create_router adds docs/middleware to our composed routes
    let router = axum_helpers::create_router::<domain_verses::ApiDoc>(api_routes);

    // Merge health endpoints into the app
    // - /health: liveness check with app name/version
    // - /ready: readiness check with an actual database probe
    let app = router
        .merge(health_router(config.app))
        .merge(health::ready_router(db));

    info!(
        "Starting {} v{} on {}",
        config.app.name,
        config.app.version,
        config.server.address()
    );

    axum_helpers::create_app(app, &config.server)
        .await
        .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Proverbs API shutdown complete");
    Ok(())
}
