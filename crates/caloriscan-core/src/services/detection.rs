//! Detection orchestrator
//!
//! One request/response cycle: availability check, quota gate, object
//! detection, nutrition generation. Each stage short-circuits on failure
//! and maps to its own [`DetectionError`] variant.
//!
//! ```text
//! image bytes
//!     │
//!     ▼
//! upstreams available? ──no──▶ UpstreamUnavailable (quota untouched)
//!     │
//!     ▼
//! QuotaLedger::try_consume ──Exhausted──▶ QuotaExceeded
//!     │
//!     ▼
//! ObjectDetector ──error──▶ UpstreamUnavailable{detection}
//!     │           ──bad image──▶ MalformedClientPayload
//!     │           ──[]────▶ NoObjectsDetected
//!     ▼
//! NutritionGenerator ──error──▶ UpstreamUnavailable{generation}
//!     │
//!     ▼
//! DetectionResult { detectedObjects, rawNutritionText, remainingQuota }
//! ```
//!
//! No lock is held across the upstream calls; the quota ledger's atomic
//! consume is the only shared mutation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DetectionResult;
use crate::services::inference::{InferenceError, NutritionGenerator, ObjectDetector};
use crate::services::quota::{ConsumeOutcome, QuotaError, QuotaLedger, QuotaPolicy};
use crate::utils::{decode_base64_image, image_fingerprint};

// ============================================================================
// Error taxonomy
// ============================================================================

pub const UNREADABLE_IMAGE: &str = "Image could not be processed.";
pub const QUOTA_EXCEEDED_PREFIX: &str = "API call limit reached.";

/// Which upstream call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStage {
    Detection,
    Generation,
}

impl fmt::Display for InferenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceStage::Detection => write!(f, "detection"),
            InferenceStage::Generation => write!(f, "generation"),
        }
    }
}

impl std::str::FromStr for InferenceStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detection" => Ok(InferenceStage::Detection),
            "generation" => Ok(InferenceStage::Generation),
            _ => Err(format!("Unknown inference stage: {}", s)),
        }
    }
}

/// Discriminant of [`DetectionError`], for matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionErrorKind {
    QuotaExceeded,
    Throttled,
    NoObjectsDetected,
    UpstreamUnavailable,
    MalformedClientPayload,
    InternalFault,
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Quota exceeded; resets {retry_hint}")]
    QuotaExceeded { retry_hint: String },

    /// Turned away by the server's per-client rate limit, before the
    /// quota gate. Only seen by HTTP clients.
    #[error("Throttled by server: {message}")]
    Throttled {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("No objects detected in the image")]
    NoObjectsDetected,

    #[error("Upstream {stage} unavailable: {source}")]
    UpstreamUnavailable {
        stage: InferenceStage,
        #[source]
        source: InferenceError,
    },

    #[error("Malformed client payload: {0}")]
    MalformedClientPayload(String),

    #[error("Internal fault: {0}")]
    InternalFault(String),
}

impl DetectionError {
    pub fn upstream(stage: InferenceStage, source: InferenceError) -> Self {
        DetectionError::UpstreamUnavailable { stage, source }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        DetectionError::MalformedClientPayload(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DetectionError::InternalFault(msg.into())
    }

    pub fn kind(&self) -> DetectionErrorKind {
        match self {
            DetectionError::QuotaExceeded { .. } => DetectionErrorKind::QuotaExceeded,
            DetectionError::Throttled { .. } => DetectionErrorKind::Throttled,
            DetectionError::NoObjectsDetected => DetectionErrorKind::NoObjectsDetected,
            DetectionError::UpstreamUnavailable { .. } => DetectionErrorKind::UpstreamUnavailable,
            DetectionError::MalformedClientPayload(_) => DetectionErrorKind::MalformedClientPayload,
            DetectionError::InternalFault(_) => DetectionErrorKind::InternalFault,
        }
    }

    /// HTTP status the server answers with
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            DetectionErrorKind::QuotaExceeded | DetectionErrorKind::Throttled => 429,
            DetectionErrorKind::NoObjectsDetected => 404,
            DetectionErrorKind::UpstreamUnavailable => 502,
            DetectionErrorKind::MalformedClientPayload => 400,
            DetectionErrorKind::InternalFault => 500,
        }
    }

    /// Client-visible message. Never contains upstream bodies or secrets.
    pub fn user_message(&self) -> String {
        match self {
            DetectionError::QuotaExceeded { retry_hint } => {
                format!("{} Please try again {}.", QUOTA_EXCEEDED_PREFIX, retry_hint)
            }
            DetectionError::Throttled { message, .. } => message.clone(),
            DetectionError::NoObjectsDetected => "No objects detected in the image.".to_string(),
            DetectionError::UpstreamUnavailable { .. } => "Upstream service unavailable".to_string(),
            DetectionError::MalformedClientPayload(msg) => msg.clone(),
            DetectionError::InternalFault(_) => "Internal Server Error".to_string(),
        }
    }

    /// Sanitized diagnostic detail for 5xx responses
    pub fn details(&self) -> Option<String> {
        match self {
            DetectionError::UpstreamUnavailable { stage, source } => {
                Some(match source {
                    InferenceError::Timeout(_) => format!("{} stage timed out", stage),
                    InferenceError::CircuitOpen(_) => {
                        format!("{} stage is failing, try again shortly", stage)
                    }
                    other => match other.upstream_status() {
                        Some(status) => {
                            format!("{} stage failed (upstream status {})", stage, status)
                        }
                        None => format!("{} stage failed", stage),
                    },
                })
            }
            DetectionError::InternalFault(_) => Some("Unexpected server error".to_string()),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<InferenceStage> {
        match self {
            DetectionError::UpstreamUnavailable { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<QuotaError> for DetectionError {
    fn from(err: QuotaError) -> Self {
        DetectionError::InternalFault(err.to_string())
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Anything that can turn image bytes into a detection result: the
/// in-process orchestrator, or an HTTP client talking to one.
#[async_trait]
pub trait DetectionGateway: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError>;
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct DetectionOrchestrator {
    quota: Arc<dyn QuotaLedger>,
    policy: QuotaPolicy,
    detector: Arc<dyn ObjectDetector>,
    generator: Arc<dyn NutritionGenerator>,
}

impl DetectionOrchestrator {
    pub fn new(
        quota: Arc<dyn QuotaLedger>,
        policy: QuotaPolicy,
        detector: Arc<dyn ObjectDetector>,
        generator: Arc<dyn NutritionGenerator>,
    ) -> Self {
        Self {
            quota,
            policy,
            detector,
            generator,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Run the full pipeline on raw image bytes
    pub async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError> {
        if image.is_empty() {
            return Err(DetectionError::malformed("Image is required."));
        }

        log::info!("[detect] Received image {}", image_fingerprint(image));

        // Fail fast before the quota gate so an open circuit costs nothing.
        if !self.detector.is_available() {
            log::warn!("[detect] {} detector unavailable, skipping quota", self.detector.name());
            return Err(DetectionError::upstream(
                InferenceStage::Detection,
                InferenceError::CircuitOpen(self.detector.name()),
            ));
        }
        if !self.generator.is_available() {
            log::warn!("[detect] {} generator unavailable, skipping quota", self.generator.name());
            return Err(DetectionError::upstream(
                InferenceStage::Generation,
                InferenceError::CircuitOpen(self.generator.name()),
            ));
        }

        let window_key = self.policy.current_key();
        let remaining = match self.quota.try_consume(&window_key).await? {
            ConsumeOutcome::Consumed { remaining } => remaining,
            ConsumeOutcome::Exhausted => {
                log::info!("[detect] Quota exhausted for {}", window_key);
                return Err(DetectionError::QuotaExceeded {
                    retry_hint: self.policy.window.retry_hint().to_string(),
                });
            }
        };

        let labels = self.detector.detect_objects(image).await.map_err(|e| {
            if let InferenceError::BadImage(reason) = &e {
                log::warn!("[detect] {} rejected the image: {}", self.detector.name(), reason);
                return DetectionError::malformed(UNREADABLE_IMAGE);
            }
            log::error!(
                "[detect] Stage=detection provider={} status={:?}: {}",
                self.detector.name(),
                e.upstream_status(),
                e
            );
            DetectionError::upstream(InferenceStage::Detection, e)
        })?;

        if labels.is_empty() {
            log::info!("[detect] No objects detected");
            return Err(DetectionError::NoObjectsDetected);
        }

        let text = self.generator.generate_nutrition(&labels).await.map_err(|e| {
            log::error!(
                "[detect] Stage=generation provider={} status={:?}: {}",
                self.generator.name(),
                e.upstream_status(),
                e
            );
            DetectionError::upstream(InferenceStage::Generation, e)
        })?;

        log::info!(
            "[detect] Done: {} objects, {} chars of nutrition text, {} calls remaining",
            labels.len(),
            text.len(),
            remaining
        );

        Ok(DetectionResult {
            detected_objects: labels,
            raw_nutrition_text: text,
            remaining_quota: remaining,
        })
    }

    /// Decode a base64 image body and run the pipeline
    pub async fn detect_base64(&self, encoded: &str) -> Result<DetectionResult, DetectionError> {
        if encoded.trim().is_empty() {
            return Err(DetectionError::malformed("Image is required."));
        }
        let bytes = decode_base64_image(encoded)
            .ok_or_else(|| DetectionError::malformed("Image must be base64-encoded."))?;
        self.detect(&bytes).await
    }

    /// Remaining calls in the current window, without consuming
    pub async fn remaining(&self) -> Result<i64, DetectionError> {
        Ok(self.quota.peek(&self.policy.current_key()).await?)
    }
}

#[async_trait]
impl DetectionGateway for DetectionOrchestrator {
    async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError> {
        DetectionOrchestrator::detect(self, image).await
    }
}
