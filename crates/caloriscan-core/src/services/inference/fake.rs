//! Scripted inference services for tests and offline runs
//!
//! Each fake replays a queue of results; the last result repeats once the
//! queue is down to one entry. Calls are counted so tests can assert that
//! a stage was (or was not) reached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{InferenceError, NutritionGenerator, ObjectDetector};

fn next_scripted<T: Clone>(
    script: &Mutex<Vec<Result<T, InferenceError>>>,
) -> Result<T, InferenceError> {
    let mut script = script
        .lock()
        .map_err(|_| InferenceError::RequestFailed("fake script lock poisoned".to_string()))?;
    match script.len() {
        0 => Err(InferenceError::NotConfigured("empty fake script".to_string())),
        1 => script[0].clone(),
        _ => script.remove(0),
    }
}

pub struct FakeDetector {
    script: Mutex<Vec<Result<Vec<String>, InferenceError>>>,
    calls: AtomicUsize,
}

impl FakeDetector {
    /// Always answer with these labels
    pub fn with_labels(labels: &[&str]) -> Self {
        Self::with_script(vec![Ok(labels.iter().map(|l| l.to_string()).collect())])
    }

    /// Always fail with this error
    pub fn failing(err: InferenceError) -> Self {
        Self::with_script(vec![Err(err)])
    }

    pub fn with_script(script: Vec<Result<Vec<String>, InferenceError>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectDetector for FakeDetector {
    async fn detect_objects(&self, _image: &[u8]) -> Result<Vec<String>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next_scripted(&self.script)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeGenerator {
    script: Mutex<Vec<Result<String, InferenceError>>>,
    calls: AtomicUsize,
    last_labels: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_script(vec![Ok(text.into())])
    }

    pub fn failing(err: InferenceError) -> Self {
        Self::with_script(vec![Err(err)])
    }

    pub fn with_script(script: Vec<Result<String, InferenceError>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            last_labels: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Labels passed to the most recent call
    pub fn last_labels(&self) -> Vec<String> {
        self.last_labels
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NutritionGenerator for FakeGenerator {
    async fn generate_nutrition(&self, labels: &[String]) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_labels.lock() {
            *last = labels.to_vec();
        }
        next_scripted(&self.script)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
