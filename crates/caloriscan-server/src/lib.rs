//! CaloriScan Server - detection API over HTTP
//!
//! The binary wires configuration, the SQLite quota store and the live
//! inference services into [`AppState`]; the router itself only depends on
//! the orchestrator, so tests drive it with in-memory fakes.

pub mod api;
pub mod config;
pub mod maintenance;
pub mod perimeter;

use std::sync::Arc;

use caloriscan_core::services::detection::DetectionOrchestrator;

pub use api::{create_router, create_router_with_limiter, RouterConfig};
pub use config::ServerConfig;
pub use perimeter::{PerimeterConfig, RateLimiter};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DetectionOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: DetectionOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}
