use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod scheduler;
mod services;
mod store;
mod validation;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub jobs: services::JobService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    scheduler::clock::resolve_zone(&config.default_timezone)
        .map_err(|e| anyhow::anyhow!("invalid DEFAULT_TIMEZONE: {}", e))?;

    let db_pool = database::create_pool(&config.database_url).await?;
    database::migrate(&db_pool).await?;

    let job_store = store::JobStore::new(db_pool.clone());
    let trigger_store = store::TriggerStore::new(db_pool.clone());
    let user_store = store::UserStore::new(db_pool.clone());

    let publisher: Arc<dyn services::RecordPublisher> =
        Arc::new(services::GatewayPublisher::new(config.bus.clone())?);

    let cancellations = scheduler::CancellationMap::new();
    let (fire_tx, fire_rx) = mpsc::channel(config.scheduler.fire_channel_capacity);
    let engine = Arc::new(scheduler::TriggerEngine::new(
        trigger_store,
        fire_tx,
        cancellations.clone(),
        config.scheduler.clone(),
    ));
    let executor = Arc::new(scheduler::UserDataExecutor::new(
        job_store.clone(),
        user_store,
        publisher,
    ));

    let restored = engine.restore().await?;
    tracing::info!("Restored {} triggers from the store", restored);
    engine.clone().start();
    scheduler::WorkerPool::new(
        fire_rx,
        executor,
        engine.clone(),
        cancellations,
        config.scheduler.worker_count,
    )
    .start();

    let job_service =
        services::JobService::new(job_store, engine, config.default_timezone.clone());
    let app_state = Arc::new(AppState {
        db_pool,
        jobs: job_service,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::PATCH])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Cadence Job Scheduler API v1.0.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/jobs", handlers::job_routes())
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn(middleware::request_logging)),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
