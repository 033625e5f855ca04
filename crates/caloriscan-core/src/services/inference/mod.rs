//! Inference service abstraction
//!
//! Two independent external collaborators, invoked one after the other by
//! the detection orchestrator:
//!
//! - [`ObjectDetector`]: image bytes -> object labels (Vision object localization)
//! - [`NutritionGenerator`]: labels -> dish JSON text (chat completion)
//!
//! Each has a live network implementation, a deterministic fake for tests,
//! and can be wrapped in [`Resilient`] for timeouts, retries and circuit
//! breaking.

pub mod fake;
pub mod llm;
pub mod prompt;
pub mod resilience;
pub mod vision;

pub use fake::{FakeDetector, FakeGenerator};
pub use llm::{http_client, LlmConfig, OpenAiNutritionGenerator, DEFAULT_OPENAI_MODEL};
pub use resilience::{BreakerPermit, CircuitBreaker, CircuitState, Resilient, RetryPolicy};
pub use vision::{VisionConfig, VisionDetector};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for calls to an inference service
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The upstream answered but could not read the submitted image
    #[error("Image rejected by upstream: {0}")]
    BadImage(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Circuit open for {0}, failing fast")]
    CircuitOpen(&'static str),
}

impl InferenceError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::RequestFailed(_)
            | InferenceError::Timeout(_)
            | InferenceError::RateLimited { .. } => true,
            InferenceError::ApiError { status, .. } => *status >= 500,
            InferenceError::ParseError(_)
            | InferenceError::BadImage(_)
            | InferenceError::NotConfigured(_)
            | InferenceError::CircuitOpen(_) => false,
        }
    }

    /// HTTP status reported by the upstream, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            InferenceError::ApiError { status, .. } => Some(*status),
            InferenceError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry API keys in the query string.
        let err = err.without_url();
        if err.is_timeout() {
            InferenceError::RequestFailed("Request timed out".to_string())
        } else if err.is_connect() {
            InferenceError::RequestFailed("Connection failed".to_string())
        } else if let Some(status) = err.status() {
            InferenceError::ApiError {
                status: status.as_u16(),
                message: status.to_string(),
            }
        } else {
            InferenceError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(err: serde_json::Error) -> Self {
        InferenceError::ParseError(err.to_string())
    }
}

/// Keep upstream error bodies short in logs and error values.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Locates food-relevant objects in an image.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Labels of the objects found, in upstream order. An empty list is a
    /// valid answer, not an error.
    async fn detect_objects(&self, image: &[u8]) -> Result<Vec<String>, InferenceError>;

    /// Short name used in logs (e.g. "vision", "fake")
    fn name(&self) -> &'static str;

    /// Quick, non-network check whether a call is worth attempting
    fn is_available(&self) -> bool {
        true
    }
}

/// Produces dish nutrition text for a set of detected labels.
#[async_trait]
pub trait NutritionGenerator: Send + Sync {
    /// Raw model output. Expected to be one of the two JSON shapes the
    /// prompt demands, but callers must treat it as untrusted text.
    async fn generate_nutrition(&self, labels: &[String]) -> Result<String, InferenceError>;

    /// Short name used in logs (e.g. "openai", "fake")
    fn name(&self) -> &'static str;

    /// Quick, non-network check whether a call is worth attempting
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(InferenceError::RequestFailed("reset".into()).is_transient());
        assert!(InferenceError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(InferenceError::RateLimited { retry_after_secs: None }.is_transient());
        assert!(InferenceError::ApiError { status: 503, message: String::new() }.is_transient());
        assert!(!InferenceError::ApiError { status: 401, message: String::new() }.is_transient());
        assert!(!InferenceError::ParseError("eof".into()).is_transient());
        assert!(!InferenceError::CircuitOpen("vision").is_transient());
    }

    #[test]
    fn test_upstream_status() {
        assert_eq!(
            InferenceError::ApiError { status: 403, message: String::new() }.upstream_status(),
            Some(403)
        );
        assert_eq!(
            InferenceError::RateLimited { retry_after_secs: Some(3) }.upstream_status(),
            Some(429)
        );
        assert_eq!(InferenceError::ParseError("x".into()).upstream_status(), None);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        assert_eq!(truncate_body(&long).len(), 200);
    }
}
