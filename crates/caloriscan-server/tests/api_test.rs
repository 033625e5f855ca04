//! Router tests: the full middleware stack driven in-process with fakes

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use caloriscan_core::services::detection::DetectionOrchestrator;
use caloriscan_core::services::inference::{FakeDetector, FakeGenerator, InferenceError};
use caloriscan_core::services::quota::{MemoryQuotaLedger, QuotaPolicy, QuotaWindowType};
use caloriscan_server::api::WELCOME;
use caloriscan_server::{create_router, AppState, PerimeterConfig, RouterConfig};

const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// base64 of "hello"
const IMAGE_B64: &str = "aGVsbG8=";

const PIZZA_JSON: &str = r#"{"object":"Pizza","ingredients":[{"name":"Cheese","calories":"200"}],"calorieMeter":"High"}"#;

struct TestApp {
    detector: Arc<FakeDetector>,
    generator: Arc<FakeGenerator>,
    config: RouterConfig,
    limit: i64,
}

impl TestApp {
    fn new() -> Self {
        Self {
            detector: Arc::new(FakeDetector::with_labels(&["Pizza", "Cheese"])),
            generator: Arc::new(FakeGenerator::with_text(PIZZA_JSON)),
            config: RouterConfig::default(),
            limit: 5,
        }
    }

    fn detector(mut self, detector: FakeDetector) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    fn generator(mut self, generator: FakeGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    fn rate_limit(mut self, max_requests: u32) -> Self {
        self.config.perimeter = PerimeterConfig {
            max_requests,
            window: Duration::from_secs(900),
            trust_forwarded_for: true,
        };
        self
    }

    fn body_limit(mut self, bytes: usize) -> Self {
        self.config.body_limit_bytes = bytes;
        self
    }

    fn router(&self) -> Router {
        let orchestrator = DetectionOrchestrator::new(
            Arc::new(MemoryQuotaLedger::new(self.limit)),
            QuotaPolicy::new(self.limit, QuotaWindowType::Daily),
            self.detector.clone(),
            self.generator.clone(),
        );
        create_router(AppState::new(orchestrator), self.config)
    }
}

fn detect_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/detect")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, BROWSER_UA)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, BROWSER_UA)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Detection
// ============================================================================

#[tokio::test]
async fn test_detect_success() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["detectedObjects"], json!(["Pizza", "Cheese"]));
    assert_eq!(body["aiResponse"], PIZZA_JSON);
    assert_eq!(body["remainingTokens"], 4);
    assert_eq!(app.generator.last_labels(), vec!["Pizza", "Cheese"]);
}

#[tokio::test]
async fn test_detect_missing_image() {
    let app = TestApp::new();
    let router = app.router();

    for body in [json!({}), json!({ "image": "" }), json!({ "image": null })] {
        let response = router.clone().oneshot(detect_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Image is required." }));
    }
    assert_eq!(app.detector.calls(), 0);
}

#[tokio::test]
async fn test_detect_non_json_body() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/detect")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, BROWSER_UA)
        .body(Body::from("not json"))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detect_invalid_base64_spends_no_quota() {
    let app = TestApp::new();
    let router = app.router();

    let response = router
        .clone()
        .oneshot(detect_request(json!({ "image": "%%% not base64 %%%" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Image must be base64-encoded.");

    let response = router.oneshot(get("/api/token-status")).await.unwrap();
    assert_eq!(json_body(response).await["remainingTokens"], 5);
}

#[tokio::test]
async fn test_detect_no_objects() {
    let app = TestApp::new().detector(FakeDetector::with_labels(&[]));
    let response = app
        .router()
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "No objects detected in the image.");
    assert_eq!(app.generator.calls(), 0);
}

#[tokio::test]
async fn test_detect_quota_exhausted() {
    let app = TestApp::new().limit(1);
    let router = app.router();

    let first = router
        .clone()
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await["remainingTokens"], 0);

    let second = router
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json_body(second).await,
        json!({ "error": "API call limit reached. Please try again tomorrow." })
    );
    // The second call never reached the detector
    assert_eq!(app.detector.calls(), 1);
}

#[tokio::test]
async fn test_detect_upstream_failure_is_sanitized() {
    let app = TestApp::new().detector(FakeDetector::failing(InferenceError::ApiError {
        status: 403,
        message: "API key not valid: AIza-secret".to_string(),
    }));
    let response = app
        .router()
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Upstream service unavailable");
    assert_eq!(body["stage"], "detection");
    assert!(!body.to_string().contains("AIza-secret"));
}

#[tokio::test]
async fn test_generation_failure_reports_stage() {
    let app = TestApp::new().generator(FakeGenerator::failing(InferenceError::Timeout(
        Duration::from_secs(30),
    )));
    let response = app
        .router()
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["stage"], "generation");
    assert_eq!(body["details"], "generation stage timed out");
}

// ============================================================================
// Token status and misc routes
// ============================================================================

#[tokio::test]
async fn test_token_status() {
    let app = TestApp::new();
    let router = app.router();

    router
        .clone()
        .oneshot(detect_request(json!({ "image": IMAGE_B64 })))
        .await
        .unwrap();

    let response = router.oneshot(get("/api/token-status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["remainingTokens"], 4);
    assert_eq!(body["limit"], 5);
    assert!(body["resetsAt"].is_string());
}

#[tokio::test]
async fn test_welcome_route() {
    let response = TestApp::new().router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], WELCOME.as_bytes());
}

#[tokio::test]
async fn test_unknown_route() {
    let response = TestApp::new().router().oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_headers() {
    let request = Request::builder()
        .uri("/api/token-status")
        .header(header::USER_AGENT, BROWSER_UA)
        .header(header::ORIGIN, "https://caloriscan.example")
        .body(Body::empty())
        .unwrap();

    let response = TestApp::new().router().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

// ============================================================================
// Perimeter
// ============================================================================

#[tokio::test]
async fn test_bots_rejected() {
    let router = TestApp::new().router();

    let no_agent = Request::builder().uri("/api/token-status").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(no_agent).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await, json!({ "error": "Bots are not allowed." }));

    let curl = Request::builder()
        .uri("/")
        .header(header::USER_AGENT, "curl/8.4.0")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(curl).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let router = TestApp::new().rate_limit(2).router();

    let from = |ip: &str| {
        Request::builder()
            .uri("/api/token-status")
            .header(header::USER_AGENT, BROWSER_UA)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = router.clone().oneshot(from("203.0.113.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router.clone().oneshot(from("203.0.113.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Too many requests. Please try again after 15 minutes." })
    );

    let response = router.oneshot(from("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_skips_welcome_route() {
    let router = TestApp::new().rate_limit(1).router();
    for _ in 0..3 {
        let response = router.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = TestApp::new().body_limit(1024);
    let image = "A".repeat(4096);
    let response = app
        .router()
        .oneshot(detect_request(json!({ "image": image })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.detector.calls(), 0);
}
