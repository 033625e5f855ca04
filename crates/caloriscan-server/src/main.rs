//! CaloriScan Server - detection API
//!
//! Serves `POST /api/detect` and `GET /api/token-status` on `PORT` (5002).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use caloriscan_core::db::Database;
use caloriscan_core::services::detection::DetectionOrchestrator;
use caloriscan_core::services::inference::{
    http_client, CircuitBreaker, OpenAiNutritionGenerator, Resilient, VisionDetector,
};
use caloriscan_core::services::quota::QuotaStore;
use caloriscan_server::config::DbLocation;
use caloriscan_server::maintenance::{Maintenance, MAINTENANCE_INTERVAL};
use caloriscan_server::{
    create_router_with_limiter, AppState, RateLimiter, RouterConfig, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    config.validate()?;

    // Initialize database
    let db = match config.db_location()? {
        DbLocation::Url(url) => Database::connect(&url).await,
        DbLocation::Path(path) => Database::open(path).await,
    }
    .context("Failed to open quota database")?;

    let policy = config.quota_policy();
    let store = QuotaStore::new(db.pool.clone(), policy.limit);
    log::info!(
        "[server] Quota: {} calls per {} window",
        policy.limit,
        policy.window
    );

    // Inference services, each behind retries and its own circuit breaker
    let client = http_client(config.upstream_timeout())?;
    let detector = Resilient::new(
        VisionDetector::with_client(config.vision_config(), client.clone()),
        config.retry_policy(),
        CircuitBreaker::default(),
    );
    let generator = Resilient::new(
        OpenAiNutritionGenerator::with_client(config.llm_config(), client),
        config.retry_policy(),
        CircuitBreaker::default(),
    );

    let orchestrator = DetectionOrchestrator::new(
        Arc::new(store.clone()),
        policy,
        Arc::new(detector),
        Arc::new(generator),
    );

    let router_config = RouterConfig {
        perimeter: config.perimeter(),
        body_limit_bytes: config.body_limit_bytes,
    };
    let limiter = Arc::new(RateLimiter::new(router_config.perimeter));
    let app = create_router_with_limiter(AppState::new(orchestrator), router_config, limiter.clone());

    let maintenance = Maintenance::new(store, policy, limiter, config.quota_retention_days)
        .spawn(MAINTENANCE_INTERVAL);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("[server] Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = maintenance.send(());
    db.pool.close().await;
    log::info!("[server] Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[server] Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("[server] Shutdown signal received");
}
