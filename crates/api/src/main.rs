use std::sync::Arc;

use draftline_api::config::AppConfig;
use draftline_api::middleware::auth::RequestAuthor;
use draftline_api::state::AppState;
use draftline_core::events::bus::EventBus;
use draftline_core::schema::load::load_dir;
use draftline_core::schema::InMemorySchemaRegistry;
use draftline_core::store::memory::MemoryVersionStore;
use draftline_core::store::postgres::PgVersionStore;
use draftline_core::store::VersionStore;
use draftline_core::DocumentService;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience)
    let _ = dotenvy::dotenv();

    let config =
        AppConfig::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting draftline API server");

    let store = connect_store(&config).await?;

    let registry = match &config.schema_dir {
        Some(dir) => load_dir(dir)
            .map_err(|e| anyhow::anyhow!("Failed to load schemas from {dir}: {e}"))?,
        None => {
            tracing::warn!("SCHEMA_DIR not set, no content types registered");
            InMemorySchemaRegistry::new()
        }
    };
    tracing::info!(content_types = registry.len(), "Schemas loaded");

    let service = DocumentService::builder(store, Arc::new(registry))
        .author(Arc::new(RequestAuthor))
        .events(EventBus::new(config.event_bus_capacity))
        .default_locale(config.default_locale.clone())?
        .build();

    let state = AppState::new(service, config.clone());
    let app = draftline_api::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store.
async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VersionStore>> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Arc::new(MemoryVersionStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect(url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;
    tracing::info!("Connected to PostgreSQL");

    let store = PgVersionStore::new(pool);
    store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(store))
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("Received Ctrl+C, shutting down..."); }
        _ = terminate => { tracing::info!("Received SIGTERM, shutting down..."); }
    }
}
