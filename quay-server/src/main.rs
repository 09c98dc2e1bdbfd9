use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quay_server::api::{self, AppState};
use quay_server::config::{Config, StoreKind};
use quay_server::db;
use quay_server::repository::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quay_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quay server...");

    let config = Config::from_env().context("Invalid configuration")?;

    let store = match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is not set")?;

            tracing::info!("Connecting to database...");

            let pool = db::create_pool(
                database_url,
                config.max_connections,
                config.acquire_timeout,
            )
            .await
            .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Store::postgres(pool)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; state is lost on restart");
            Store::in_memory()
        }
    };

    let app = api::create_router(AppState {
        store,
        max_claim: config.max_claim,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
