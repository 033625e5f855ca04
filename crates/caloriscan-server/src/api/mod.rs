//! API module - Axum routes
//!
//! ```text
//!   request
//!      │
//!      ▼
//!   CORS ─► body limit ─► bot filter ─┬─► GET /            welcome
//!                                     │
//!                                     └─► /api ─► rate limit ─┬─► POST /api/detect
//!                                                             └─► GET  /api/token-status
//! ```

pub mod detect;
pub mod error;
pub mod token_status;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use caloriscan_core::models::ErrorResponse;

use crate::perimeter::{self, PerimeterConfig, RateLimiter};
use crate::AppState;

pub use error::ApiError;

pub const WELCOME: &str = "Welcome to the CaloriScan Backend!";

/// Router-level settings that are not part of the shared state
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub perimeter: PerimeterConfig,
    pub body_limit_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            perimeter: PerimeterConfig::default(),
            body_limit_bytes: crate::config::DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

/// Create the API router with all routes
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    create_router_with_limiter(state, config, Arc::new(RateLimiter::new(config.perimeter)))
}

/// Same as [`create_router`] with a caller-owned limiter (for pruning)
pub fn create_router_with_limiter(
    state: AppState,
    config: RouterConfig,
    limiter: Arc<RateLimiter>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .merge(detect::routes())
        .merge(token_status::routes())
        .layer(middleware::from_fn_with_state(limiter, perimeter::rate_limit));

    Router::new()
        .route("/", get(welcome))
        .nest("/api", api)
        .fallback(not_found)
        .layer(middleware::from_fn(perimeter::block_bots))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(cors)
        .with_state(state)
}

async fn welcome() -> &'static str {
    WELCOME
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Not Found").with_message("Route not found")),
    )
}
