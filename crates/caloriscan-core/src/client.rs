//! HTTP client for a CaloriScan server
//!
//! Implements [`DetectionGateway`] over `POST /api/detect`, mapping status
//! codes back onto the detection error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DetectRequest, DetectResponse, DetectionResult, ErrorResponse, TokenStatusResponse};
use crate::services::detection::{
    DetectionError, DetectionGateway, InferenceStage, QUOTA_EXCEEDED_PREFIX,
};
use crate::services::inference::InferenceError;
use crate::utils::encode_base64_image;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5002";

/// Sent on every request; the server rejects empty agents
pub const USER_AGENT: &str = concat!("caloriscan-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to reach server: {0}")]
    Unreachable(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Unreachable(err.to_string())
        }
    }
}

/// Recover the window hint from "API call limit reached. Please try again <hint>."
fn retry_hint_from(message: &str) -> String {
    message
        .split_once("try again ")
        .map(|(_, rest)| rest.trim_end_matches('.').trim().to_string())
        .filter(|hint| !hint.is_empty())
        .unwrap_or_else(|| "later".to_string())
}

const THROTTLED_FALLBACK: &str = "Too many requests. Please try again later.";

/// Rebuild a [`DetectionError`] from a non-2xx response.
///
/// A 429 is either the detection quota or the per-client rate limit; the
/// rate limit sends `Retry-After`, the quota does not.
pub fn error_from_response(
    status: u16,
    body: Option<ErrorResponse>,
    retry_after_secs: Option<u64>,
) -> DetectionError {
    let message = body
        .as_ref()
        .map(|b| b.error.clone())
        .unwrap_or_default();

    match status {
        400 | 413 => DetectionError::malformed(if message.is_empty() {
            "Image is required.".to_string()
        } else {
            message
        }),
        404 => DetectionError::NoObjectsDetected,
        429 if retry_after_secs.is_none() && message.starts_with(QUOTA_EXCEEDED_PREFIX) => {
            DetectionError::QuotaExceeded {
                retry_hint: retry_hint_from(&message),
            }
        }
        429 => DetectionError::Throttled {
            message: if message.is_empty() {
                THROTTLED_FALLBACK.to_string()
            } else {
                message
            },
            retry_after_secs,
        },
        502 | 503 | 504 => {
            let stage = body
                .as_ref()
                .and_then(|b| b.stage.as_deref())
                .and_then(|s| s.parse().ok())
                .unwrap_or(InferenceStage::Detection);
            let detail = body
                .and_then(|b| b.details)
                .unwrap_or_else(|| message.clone());
            DetectionError::upstream(
                stage,
                InferenceError::ApiError {
                    status,
                    message: detail,
                },
            )
        }
        _ => DetectionError::internal(format!("server returned {}: {}", status, message)),
    }
}

#[derive(Clone)]
pub struct HttpDetectionClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDetectionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /api/token-status`
    pub async fn token_status(&self) -> Result<TokenStatusResponse, ClientError> {
        let response = self.client.get(self.url("/api/token-status")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: Option<ErrorResponse> = response.json().await.ok();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: body.map(|b| b.error).unwrap_or_else(|| status.to_string()),
            });
        }
        Ok(response.json().await?)
    }

    /// `POST /api/detect` with a pre-encoded base64 body
    pub async fn detect_base64(&self, image: String) -> Result<DetectionResult, DetectionError> {
        let request = DetectRequest { image: Some(image) };

        let response = self
            .client
            .post(self.url("/api/detect"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DetectionError::internal(format!("Failed to reach server: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let body: DetectResponse = response
                .json()
                .await
                .map_err(|e| DetectionError::internal(format!("Unexpected response body: {}", e)))?;
            return Ok(body.into());
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body: Option<ErrorResponse> = response.json().await.ok();
        log::debug!("[client] detect failed with {}: {:?}", status, body);
        Err(error_from_response(status.as_u16(), body, retry_after))
    }
}

#[async_trait]
impl DetectionGateway for HttpDetectionClient {
    async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError> {
        self.detect_base64(encode_base64_image(image)).await
    }
}
