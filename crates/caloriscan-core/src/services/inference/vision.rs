//! Object detection via the Google Cloud Vision `images:annotate` endpoint

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::llm::retry_after_secs;
use super::{truncate_body, InferenceError, ObjectDetector};

pub const DEFAULT_VISION_BASE_URL: &str = "https://vision.googleapis.com";
pub const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: u32,
}

impl VisionConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_VISION_BASE_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ============ Wire types ============

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    localized_object_annotations: Vec<LocalizedObject>,
    error: Option<StatusBody>,
}

#[derive(Debug, Deserialize)]
struct LocalizedObject {
    name: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

fn build_request(image: &[u8], max_results: u32) -> AnnotateRequest {
    AnnotateRequest {
        requests: vec![AnnotateImageRequest {
            image: ImageContent {
                content: base64::engine::general_purpose::STANDARD.encode(image),
            },
            features: vec![Feature {
                feature_type: "OBJECT_LOCALIZATION",
                max_results,
            }],
        }],
    }
}

/// Labels from the first per-image response, in upstream order
fn extract_labels(body: &str) -> Result<Vec<String>, InferenceError> {
    let parsed: AnnotateResponse = serde_json::from_str(body).map_err(|e| {
        InferenceError::ParseError(format!("{}. Raw: {}", e, truncate_body(body)))
    })?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(err) = first.error {
        return Err(InferenceError::BadImage(format!(
            "Vision error {}: {}",
            err.code,
            truncate_body(&err.message)
        )));
    }

    for obj in &first.localized_object_annotations {
        log::debug!("[inference:vision] {} ({:.2})", obj.name, obj.score);
    }

    Ok(first
        .localized_object_annotations
        .into_iter()
        .map(|o| o.name)
        .filter(|n| !n.trim().is_empty())
        .collect())
}

pub struct VisionDetector {
    config: VisionConfig,
    client: reqwest::Client,
}

impl VisionDetector {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(config: VisionConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[async_trait]
impl ObjectDetector for VisionDetector {
    async fn detect_objects(&self, image: &[u8]) -> Result<Vec<String>, InferenceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| InferenceError::NotConfigured("Vision API key not configured".to_string()))?;

        let url = format!(
            "{}/v1/images:annotate",
            self.config.base_url.trim_end_matches('/')
        );
        let request = build_request(image, self.config.max_results);

        log::info!(
            "[inference:vision] Annotating {} bytes (maxResults={})",
            image.len(),
            self.config.max_results
        );

        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(InferenceError::RateLimited {
                retry_after_secs: retry_after_secs(response.headers()),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::warn!("[inference:vision] API error {}: {}", status, truncate_body(&text));
            return Err(InferenceError::ApiError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }

        let body = response.text().await?;
        let labels = extract_labels(&body)?;
        log::info!("[inference:vision] Detected {} objects: {:?}", labels.len(), labels);
        Ok(labels)
    }

    fn name(&self) -> &'static str {
        "vision"
    }
}
