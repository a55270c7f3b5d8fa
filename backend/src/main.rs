use axum::{
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod database;
mod error;
mod handlers;
mod jobs;
mod store;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub engine: Arc<jobs::RecurringWorkJob>,
    pub scheduler: Arc<jobs::JobScheduler>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url).await?;

    database::migrate(&db_pool).await?;

    let gateway = Arc::new(store::PostgresGateway::new(db_pool.clone()));
    let engine = Arc::new(jobs::RecurringWorkJob::new(gateway));

    let scheduler = Arc::new(jobs::JobScheduler::new(engine.clone(), jobs::JobConfig::from_env()).await?);
    scheduler.start().await?;

    let app_state = Arc::new(AppState {
        db_pool,
        engine,
        scheduler,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "FieldOps Service Platform API v1.0.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/scheduler", handlers::scheduler_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
