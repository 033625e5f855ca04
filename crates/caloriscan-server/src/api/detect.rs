//! Detection API routes

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use uuid::Uuid;

use caloriscan_core::models::{DetectRequest, DetectResponse};
use caloriscan_core::services::detection::DetectionError;

use super::ApiError;
use crate::AppState;

/// Detection routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/detect", post(detect))
}

/// `POST /api/detect` - quota-gated detection plus nutrition generation
async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    let Json(request) = payload.map_err(|rejection| {
        log::warn!("[api] {} rejected body: {}", request_id, rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            DetectionError::malformed("Image is required.").into()
        }
    })?;

    let image = request
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| DetectionError::malformed("Image is required."))?;

    log::debug!("[api] {} detect ({} base64 chars)", request_id, image.len());

    match state.orchestrator.detect_base64(&image).await {
        Ok(result) => {
            log::info!(
                "[api] {} detected {} object(s), {} calls left",
                request_id,
                result.detected_objects.len(),
                result.remaining_quota
            );
            Ok(Json(result.into()))
        }
        Err(err) => {
            log::info!("[api] {} detect failed: {:?}", request_id, err.kind());
            Err(err.into())
        }
    }
}
