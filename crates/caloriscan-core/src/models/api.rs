//! Wire types for the detection API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/detect`
///
/// `image` is base64 without a data-URI prefix. It is optional here so a
/// missing field surfaces as a 400 from the handler rather than a
/// deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// Outcome of one successful orchestration call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub detected_objects: Vec<String>,
    /// Text returned by the nutrition generator. Expected to be JSON but
    /// never validated server-side.
    pub raw_nutrition_text: String,
    pub remaining_quota: i64,
}

/// Body of a `200` from `POST /api/detect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub detected_objects: Vec<String>,
    pub ai_response: String,
    pub remaining_tokens: i64,
}

impl From<DetectionResult> for DetectResponse {
    fn from(result: DetectionResult) -> Self {
        Self {
            detected_objects: result.detected_objects,
            ai_response: result.raw_nutrition_text,
            remaining_tokens: result.remaining_quota,
        }
    }
}

impl From<DetectResponse> for DetectionResult {
    fn from(response: DetectResponse) -> Self {
        Self {
            detected_objects: response.detected_objects,
            raw_nutrition_text: response.ai_response,
            remaining_quota: response.remaining_tokens,
        }
    }
}

/// Body of `GET /api/token-status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatusResponse {
    pub remaining_tokens: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

/// Error envelope returned by every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Failing upstream stage (`detection` or `generation`) on a 502
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            details: None,
            stage: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_response_wire_names() {
        let response = DetectResponse {
            detected_objects: vec!["pizza".to_string()],
            ai_response: "{}".to_string(),
            remaining_tokens: 42,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["detectedObjects"][0], "pizza");
        assert_eq!(json["aiResponse"], "{}");
        assert_eq!(json["remainingTokens"], 42);
    }

    #[test]
    fn test_detect_request_missing_image() {
        let request: DetectRequest = serde_json::from_str("{}").unwrap();
        assert!(request.image.is_none());
    }

    #[test]
    fn test_token_status_minimal_body() {
        let status: TokenStatusResponse =
            serde_json::from_str(r#"{"remainingTokens": 7}"#).unwrap();
        assert_eq!(status.remaining_tokens, 7);
        assert!(status.limit.is_none());
        assert!(status.resets_at.is_none());
    }

    #[test]
    fn test_error_response_skips_empty_fields() {
        let json = serde_json::to_string(&ErrorResponse::new("Image is required.")).unwrap();
        assert_eq!(json, r#"{"error":"Image is required."}"#);
    }
}
