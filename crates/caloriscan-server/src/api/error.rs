//! HTTP rendering of detection errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use caloriscan_core::models::ErrorResponse;
use caloriscan_core::services::detection::{DetectionError, DetectionErrorKind};

pub const PAYLOAD_TOO_LARGE: &str = "Image is too large.";

/// Error on its way out of a handler
#[derive(Debug)]
pub enum ApiError {
    Detection(DetectionError),
    /// Body exceeded the configured limit while being read
    PayloadTooLarge,
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        ApiError::Detection(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Detection(err) => StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let err = match self {
            ApiError::Detection(err) => err,
            ApiError::PayloadTooLarge => return ErrorResponse::new(PAYLOAD_TOO_LARGE),
        };
        let mut body = ErrorResponse::new(err.user_message());

        if err.kind() == DetectionErrorKind::NoObjectsDetected {
            body = body.with_message(err.user_message());
        }
        if let Some(details) = err.details() {
            body = body.with_details(details);
        }
        if let Some(stage) = err.stage() {
            body = body.with_stage(stage.to_string());
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Detection(err) = &self {
            if status.is_server_error() {
                log::error!("[api] {}", err);
            }
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caloriscan_core::services::detection::InferenceStage;
    use caloriscan_core::services::inference::InferenceError;

    #[test]
    fn test_upstream_body_is_sanitized() {
        let err = ApiError::Detection(DetectionError::upstream(
            InferenceStage::Generation,
            InferenceError::ApiError {
                status: 401,
                message: "Incorrect API key provided: sk-abc".to_string(),
            },
        ));

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let body = err.body();
        assert_eq!(body.error, "Upstream service unavailable");
        assert_eq!(body.stage.as_deref(), Some("generation"));
        let details = body.details.unwrap();
        assert!(details.contains("401"));
        assert!(!details.contains("sk-abc"));
    }

    #[test]
    fn test_no_objects_carries_message() {
        let body = ApiError::Detection(DetectionError::NoObjectsDetected).body();
        assert_eq!(body.message.as_deref(), Some("No objects detected in the image."));
        assert!(body.details.is_none());
    }

    #[test]
    fn test_quota_exceeded_status() {
        let err = ApiError::Detection(DetectionError::QuotaExceeded {
            retry_hint: "tomorrow".to_string(),
        });
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            err.body().error,
            "API call limit reached. Please try again tomorrow."
        );
    }
}
