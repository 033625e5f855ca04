//! Perimeter middleware: per-IP rate ceiling and bot filter
//!
//! Both run before any handler, so rejected requests never touch the
//! quota counter or the inference services.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;

use caloriscan_core::models::ErrorResponse;

pub const BOT_REJECTION: &str = "Bots are not allowed.";

/// User-Agent fragments that mark automated clients (matched lowercase)
const BOT_SIGNATURES: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "slurp",
    "curl",
    "wget",
    "python-requests",
    "scrapy",
    "headlesschrome",
    "phantomjs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerimeterConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// Use the first X-Forwarded-For hop as the client key
    pub trust_forwarded_for: bool,
}

impl Default for PerimeterConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            trust_forwarded_for: false,
        }
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Bucket {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Fixed-window request counter per client key
pub struct RateLimiter {
    config: PerimeterConfig,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: PerimeterConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PerimeterConfig {
        &self.config
    }

    /// Count one request against `key`
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(bucket.started);
        if elapsed >= self.config.window {
            bucket.started = now;
            bucket.count = 0;
        }

        if bucket.count >= self.config.max_requests {
            let retry_after = self
                .config
                .window
                .saturating_sub(now.saturating_duration_since(bucket.started));
            return RateDecision::Limited { retry_after };
        }

        bucket.count += 1;
        RateDecision::Allowed {
            remaining: self.config.max_requests - bucket.count,
        }
    }

    /// Drop buckets whose window has passed
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.started) < self.config.window);
        before - self.buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// "Too many requests. Please try again after 15 minutes."
    pub fn rejection_message(&self) -> String {
        let minutes = self.config.window.as_secs().div_ceil(60).max(1);
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!("Too many requests. Please try again after {} {}.", minutes, unit)
    }
}

/// Client key: the peer address, or the first forwarded hop when trusted
fn client_key(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(request.headers()) {
            return ip;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request, limiter.config().trust_forwarded_for);

    match limiter.check(&key) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            log::warn!("[perimeter] Rate limit hit for {} on {}", key, request.uri().path());
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new(limiter.rejection_message())),
            )
                .into_response();
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

// ============================================================================
// Bot filter
// ============================================================================

/// True for an empty or missing agent, or one carrying a bot signature
pub fn is_automated_agent(user_agent: Option<&str>) -> bool {
    let agent = match user_agent.map(str::trim) {
        Some(a) if !a.is_empty() => a.to_lowercase(),
        _ => return true,
    };
    BOT_SIGNATURES.iter().any(|sig| agent.contains(sig))
}

pub async fn block_bots(request: Request<Body>, next: Next) -> Response {
    let agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    if is_automated_agent(agent) {
        log::info!(
            "[perimeter] Rejected agent {:?} on {}",
            agent.unwrap_or(""),
            request.uri().path()
        );
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new(BOT_REJECTION))).into_response();
    }

    next.run(request).await
}
