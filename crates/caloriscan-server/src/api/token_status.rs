//! Token status API routes

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use caloriscan_core::models::TokenStatusResponse;

use super::ApiError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/token-status", get(token_status))
}

/// `GET /api/token-status` - remaining calls in the current window
async fn token_status(State(state): State<AppState>) -> Result<Json<TokenStatusResponse>, ApiError> {
    let remaining = state.orchestrator.remaining().await?;
    let policy = state.orchestrator.policy();

    Ok(Json(TokenStatusResponse {
        remaining_tokens: remaining,
        limit: Some(policy.limit),
        resets_at: Some(policy.current_window_end()),
    }))
}
