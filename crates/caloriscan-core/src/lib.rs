//! # caloriscan-core
//!
//! Core logic for CaloriScan - shared between the server and the CLI.
//!
//! This crate provides:
//! - Database operations (`db` module)
//! - Data models (`models` module)
//! - Quota, inference, detection and presentation services (`services` module)
//! - The client-side capture/scan state machine (`capture` module)
//! - An HTTP client for the detection API (`client` module)
//! - Unified error handling (`error` module)

pub mod capture;
pub mod client;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Re-exports for convenience
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from models
pub use models::{
    DetectRequest, DetectResponse, DetectionResult, Dish, ErrorResponse, Ingredient,
    TokenStatusResponse, FOOD_NOT_FOUND_SENTINEL,
};

// Re-export commonly used types from services
pub use services::{
    CalorieMeter, ConsumeOutcome, DetectionError, DetectionErrorKind, DetectionGateway,
    DetectionOrchestrator, DishView, InferenceError, InferenceStage, NutritionGenerator,
    ObjectDetector, PresentationState, QuotaLedger, QuotaPolicy, QuotaStore, QuotaWindowType,
};

pub use capture::{CaptureController, CaptureError, CaptureSession};
pub use client::{ClientError, HttpDetectionClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_version_format() {
        let v = version();
        // Should be semver format: x.y.z
        let parts: Vec<&str> = v.split('.').collect();
        assert_eq!(parts.len(), 3, "Version should be in x.y.z format");
    }
}
