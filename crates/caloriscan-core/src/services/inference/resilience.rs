//! Timeouts, bounded retries and circuit breaking for inference calls
//!
//! ```text
//! Resilient<T>
//!   ├── CircuitBreaker   open after N consecutive failures, half-open after cool-down
//!   └── RetryPolicy      per-attempt timeout, exponential backoff with jitter,
//!                        transient failures only
//! ```

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;

use super::{InferenceError, NutritionGenerator, ObjectDetector};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(30);

// ============================================================================
// RetryPolicy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Deadline for each individual attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            ..Self::default()
        }
    }

    /// Single attempt, no backoff
    pub fn no_retry(timeout: Duration) -> Self {
        Self::new(1, timeout)
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Delay before attempt `attempt + 1`; `attempt` counts from 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let jitter_ms = delay.as_millis() as u64 / 2;
        if jitter_ms == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        (delay + Duration::from_millis(jitter)).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, InferenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(InferenceError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let mut delay = self.backoff(attempt);
                    if let InferenceError::RateLimited {
                        retry_after_secs: Some(secs),
                    } = err
                    {
                        delay = delay.max(Duration::from_secs(secs)).min(self.max_delay);
                    }
                    log::warn!(
                        "[inference:{}] Attempt {}/{} failed: {}. Retrying in {:?}",
                        label,
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 1 {
                        log::warn!(
                            "[inference:{}] Giving up after {} attempts: {}",
                            label,
                            attempt,
                            err
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

// ============================================================================
// CircuitBreaker
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Cool-down elapsed; the next call is a trial
    HalfOpen,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cool_down: Duration,
    state: Mutex<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOL_DOWN)
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cool_down,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn state(&self) -> CircuitState {
        let Ok(state) = self.state.lock() else {
            return CircuitState::Open;
        };
        match state.opened_at {
            None => CircuitState::Closed,
            Some(at) if at.elapsed() >= self.cool_down => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }

    /// Non-reserving check: would a call be let through right now?
    pub fn is_available(&self) -> bool {
        let Ok(state) = self.state.lock() else {
            return false;
        };
        match state.opened_at {
            None => true,
            Some(at) => at.elapsed() >= self.cool_down && !state.trial_in_flight,
        }
    }

    /// Reserve permission for a call. In half-open state only one trial
    /// call is admitted at a time; the permit holds that slot until it is
    /// settled or dropped.
    pub fn try_acquire(&self) -> Option<BreakerPermit<'_>> {
        let mut state = self.state.lock().ok()?;
        let trial = match state.opened_at {
            None => false,
            Some(at) if at.elapsed() >= self.cool_down && !state.trial_in_flight => {
                state.trial_in_flight = true;
                true
            }
            Some(_) => return None,
        };
        Some(BreakerPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = BreakerState::default();
        }
    }

    fn record_failure(&self, trial: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if trial {
                state.trial_in_flight = false;
            }
            if trial || state.consecutive_failures >= self.failure_threshold {
                state.opened_at = Some(Instant::now());
            }
        }
    }

    fn release_trial(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.trial_in_flight = false;
        }
    }
}

/// One admitted call. Settle it with [`succeed`](Self::succeed) or
/// [`fail`](Self::fail); dropping it unsettled (cancelled caller, or an
/// outcome that says nothing about upstream health) frees a half-open
/// trial slot without moving the breaker.
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial();
        }
    }
}

// ============================================================================
// Resilient wrapper
// ============================================================================

/// Wraps an inference service with a retry policy and a circuit breaker
pub struct Resilient<T> {
    inner: T,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl<T> Resilient<T> {
    pub fn new(inner: T, retry: RetryPolicy, breaker: CircuitBreaker) -> Self {
        Self {
            inner,
            retry,
            breaker,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn guarded<R, F, Fut>(&self, label: &'static str, op: F) -> Result<R, InferenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, InferenceError>>,
    {
        let Some(permit) = self.breaker.try_acquire() else {
            log::warn!("[inference:{}] Circuit open, failing fast", label);
            return Err(InferenceError::CircuitOpen(label));
        };

        match self.retry.run(label, op).await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) if err.is_transient() => {
                permit.fail();
                if self.breaker.state() != CircuitState::Closed {
                    log::warn!("[inference:{}] Circuit opened after: {}", label, err);
                }
                Err(err)
            }
            // Upstream answered; the request itself was at fault.
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl<T: ObjectDetector> ObjectDetector for Resilient<T> {
    async fn detect_objects(&self, image: &[u8]) -> Result<Vec<String>, InferenceError> {
        let name = self.inner.name();
        self.guarded(name, || self.inner.detect_objects(image)).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn is_available(&self) -> bool {
        self.breaker.is_available() && self.inner.is_available()
    }
}

#[async_trait]
impl<T: NutritionGenerator> NutritionGenerator for Resilient<T> {
    async fn generate_nutrition(&self, labels: &[String]) -> Result<String, InferenceError> {
        let name = self.inner.name();
        self.guarded(name, || self.inner.generate_nutrition(labels)).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn is_available(&self) -> bool {
        self.breaker.is_available() && self.inner.is_available()
    }
}
