//! Nutrition generation over an OpenAI-compatible chat completions API

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompt::{build_nutrition_prompt, NUTRITION_MAX_TOKENS, SYSTEM_PROMPT};
use super::{truncate_body, InferenceError, NutritionGenerator};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Output token cap for each completion
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key,
            base_url: None,
            max_tokens: NUTRITION_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Token usage reported for a single completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub duration_ms: i64,
}

/// OpenAI request for newer models (o1, o3) that don't support temperature
#[derive(Debug, Serialize)]
struct OpenAIRequestNewNoTemp {
    model: String,
    messages: Vec<OpenAIMessageRequest>,
    max_completion_tokens: u32,
}

/// OpenAI request for newer models (gpt-4.1, gpt-4o) that use max_completion_tokens with temperature
#[derive(Debug, Serialize)]
struct OpenAIRequestNew {
    model: String,
    messages: Vec<OpenAIMessageRequest>,
    max_completion_tokens: u32,
    temperature: f32,
}

/// OpenAI request for legacy models (gpt-4-turbo, gpt-4, gpt-3.5) that use max_tokens
#[derive(Debug, Serialize)]
struct OpenAIRequestLegacy {
    model: String,
    messages: Vec<OpenAIMessageRequest>,
    max_tokens: u32,
    temperature: f32,
}

/// Check if a model uses the new max_completion_tokens parameter
fn uses_max_completion_tokens(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("gpt-4.1")
        || model.starts_with("gpt-4o")
        || model.starts_with("o1")
        || model.starts_with("o3")
}

/// Check if a model doesn't support custom temperature (only default 1)
fn no_temperature_support(model: &str) -> bool {
    model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3")
}

#[derive(Debug, Serialize)]
struct OpenAIMessageRequest {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

/// Serialize the request body shape the configured model accepts
fn build_request_body(
    model: &str,
    messages: Vec<OpenAIMessageRequest>,
    max_tokens: u32,
) -> Result<serde_json::Value, InferenceError> {
    let value = if no_temperature_support(model) {
        serde_json::to_value(OpenAIRequestNewNoTemp {
            model: model.to_string(),
            messages,
            max_completion_tokens: max_tokens,
        })?
    } else if uses_max_completion_tokens(model) {
        serde_json::to_value(OpenAIRequestNew {
            model: model.to_string(),
            messages,
            max_completion_tokens: max_tokens,
            temperature: 0.3,
        })?
    } else {
        serde_json::to_value(OpenAIRequestLegacy {
            model: model.to_string(),
            messages,
            max_tokens,
            temperature: 0.3,
        })?
    };
    Ok(value)
}

/// Pull the first choice's text out of a chat completions response body
fn extract_completion(body: &str) -> Result<(String, Option<OpenAIUsage>), InferenceError> {
    let result: OpenAIResponse = serde_json::from_str(body).map_err(|e| {
        InferenceError::ParseError(format!("{}. Raw: {}", e, truncate_body(body)))
    })?;

    let text = result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| InferenceError::ParseError("No content in completion".to_string()))?;

    Ok((text, result.usage))
}

/// Parse a `Retry-After` header given in whole seconds
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

pub struct OpenAiNutritionGenerator {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiNutritionGenerator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured client (shared pool, custom timeouts)
    pub fn with_client(config: LlmConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Check if the generator has credentials
    pub fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<(String, LlmUsage), InferenceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| InferenceError::NotConfigured("OpenAI API key not configured".to_string()))?;

        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
            .trim_end_matches('/');

        let messages = vec![
            OpenAIMessageRequest {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            OpenAIMessageRequest {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ];

        log::info!(
            "[inference:llm] Request: model={}, max_tokens={}, no_temp={}, uses_mct={}",
            self.config.model,
            self.config.max_tokens,
            no_temperature_support(&self.config.model),
            uses_max_completion_tokens(&self.config.model)
        );

        let body = build_request_body(&self.config.model, messages, self.config.max_tokens)?;
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
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
            log::warn!("[inference:llm] API error {}: {}", status, truncate_body(&text));
            return Err(InferenceError::ApiError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }

        let response_text = response.text().await?;
        let (text, usage) = extract_completion(&response_text)?;

        let usage = LlmUsage {
            prompt_tokens: usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().and_then(|u| u.completion_tokens),
            total_tokens: usage.as_ref().and_then(|u| u.total_tokens),
            duration_ms: start.elapsed().as_millis() as i64,
        };

        log::info!(
            "[inference:llm] Completion: {} chars, tokens={:?}/{:?}, {}ms",
            text.len(),
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.duration_ms
        );

        Ok((text, usage))
    }
}

#[async_trait]
impl NutritionGenerator for OpenAiNutritionGenerator {
    async fn generate_nutrition(&self, labels: &[String]) -> Result<String, InferenceError> {
        let prompt = build_nutrition_prompt(labels);
        let (text, _usage) = self.complete(&prompt).await?;
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Build a reqwest client with an overall per-request timeout
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, InferenceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(InferenceError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_parameter_selection() {
        assert!(!uses_max_completion_tokens("gpt-3.5-turbo"));
        assert!(uses_max_completion_tokens("gpt-4o-mini"));
        assert!(no_temperature_support("o3-mini"));
        assert!(!no_temperature_support("gpt-4o"));
    }

    #[test]
    fn test_legacy_body_uses_max_tokens() {
        let body = build_request_body(
            "gpt-3.5-turbo",
            vec![OpenAIMessageRequest {
                role: "user".into(),
                content: "hi".into(),
            }],
            500,
        )
        .unwrap();
        assert_eq!(body["max_tokens"], 500);
        assert!(body.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_new_body_without_temperature() {
        let body = build_request_body("o1-mini", Vec::new(), 500).unwrap();
        assert_eq!(body["max_completion_tokens"], 500);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_extract_completion() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"object\":\"Pizza\"}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
        }"#;
        let (text, usage) = extract_completion(body).unwrap();
        assert_eq!(text, r#"{"object":"Pizza"}"#);
        assert_eq!(usage.unwrap().total_tokens, Some(200));
    }

    #[test]
    fn test_extract_completion_empty_choices() {
        let err = extract_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, InferenceError::ParseError(_)));
    }

    #[test]
    fn test_extract_completion_garbage() {
        let err = extract_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, InferenceError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let generator = OpenAiNutritionGenerator::new(LlmConfig::new(None));
        assert!(!generator.is_configured());
        let err = generator
            .generate_nutrition(&["Pizza".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::NotConfigured(_)));
    }

    #[test]
    fn test_config_builder() {
        let config = LlmConfig::new(Some("sk-test".into()))
            .with_model("gpt-4o-mini")
            .with_base_url("http://localhost:8080/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }
}
