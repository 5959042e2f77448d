use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mlab_orchestrator::balancer::{
    HttpConnector, LoadBalancer, RetryQueue, RunnerRegistry, RunnerSource,
};
use mlab_orchestrator::config::{Config, RunnerSourceConfig};
use mlab_orchestrator::repository::{
    PgCatalogRepository, PgJobRepository, PgQueueStore, PgResultRepository,
};
use mlab_orchestrator::service::{Orchestrator, Settings, Stores};
use mlab_orchestrator::workspace::Workspace;
use mlab_orchestrator::{api, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mlab_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MLab Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    tokio::fs::create_dir_all(&config.results_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.results_dir.display()))?;

    let source = match &config.runners {
        RunnerSourceConfig::File(path) => RunnerSource::File(path.clone()),
        RunnerSourceConfig::Discovery(url) => RunnerSource::Discovery(url.clone()),
    };
    tracing::info!("Runners from {:?}", source);

    let registry = RunnerRegistry::new(source, Arc::new(HttpConnector::new(config.probe_timeout)));
    let retry_queue = RetryQueue::new(Arc::new(PgQueueStore::new(pool.clone())), &config.retry_queue);
    let balancer = Arc::new(LoadBalancer::new(registry, retry_queue));

    let stores = Stores {
        jobs: Arc::new(PgJobRepository::new(pool.clone())),
        results: Arc::new(PgResultRepository::new(pool.clone())),
        catalog: Arc::new(PgCatalogRepository::new(pool)),
    };
    let orchestrator = Orchestrator::new(
        stores,
        balancer,
        Workspace::new(&config.results_dir),
        Settings::from(&config),
    );

    // Build router with all API endpoints
    let app = api::create_router(orchestrator);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
