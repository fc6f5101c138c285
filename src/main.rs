mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::delivery::http::v1::customers::{get_customer, register_customer};
use crate::delivery::http::v1::deals::get_deal;
use crate::delivery::http::v1::ratings::{get_average, list_ratings, submit_rating};
use crate::repository::postgres::{
    create_pool, PostgresCustomerRepository, PostgresDealRepository, PostgresRatingRepository,
    PostgresReportRepository,
};
use crate::usecase::customers::CustomersUseCase;
use crate::usecase::ratings::RatingsUseCase;

pub struct AppState {
    pub ratings_usecase: RatingsUseCase<
        PostgresCustomerRepository,
        PostgresDealRepository,
        PostgresRatingRepository,
        PostgresReportRepository,
    >,
    pub customers_usecase: CustomersUseCase<PostgresCustomerRepository>,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let tracer_provider = if config.telemetry_enabled {
        let telemetry_config = telemetry::TelemetryConfig::from(&config);
        let provider = telemetry::init_telemetry_with_subscriber(&telemetry_config, env_filter)
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
        Some(provider)
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
        None
    };

    tracing::info!("starting the peerrate service");

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    tracing::info!(telemetry_enabled = config.telemetry_enabled, "config loaded");

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let ratings_usecase = RatingsUseCase::new(
        PostgresCustomerRepository::new(pool.clone()),
        PostgresDealRepository::new(pool.clone()),
        PostgresRatingRepository::new(pool.clone()),
        PostgresReportRepository::new(pool.clone()),
    );
    let customers_usecase = CustomersUseCase::new(PostgresCustomerRepository::new(pool));

    let shared_state = Arc::new(AppState {
        ratings_usecase,
        customers_usecase,
        metrics_handle,
    });

    let api = Router::new()
        .route("/api/v1/ratings", post(submit_rating))
        .route("/api/v1/customers/register", post(register_customer))
        .route("/api/v1/customers/{subject}", get(get_customer))
        .route("/api/v1/customers/{subject}/ratings", get(list_ratings))
        .route("/api/v1/customers/{subject}/average", get(get_average))
        .route("/api/v1/deals/{platform}/{proof_ref}", get(get_deal));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(listen_addr = %config.listen_addr, "peerrate service running");
    axum::serve(listener, router).await?;

    if let Some(provider) = tracer_provider {
        telemetry::shutdown_telemetry(provider);
    }

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
