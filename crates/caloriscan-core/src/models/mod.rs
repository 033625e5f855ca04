//! Data models for CaloriScan
//!
//! - `dish`: the dish record carried by QR payloads and nutrition responses
//! - `api`: request/response bodies of the detection HTTP surface

pub mod api;
pub mod dish;

pub use api::{
    DetectRequest, DetectResponse, DetectionResult, ErrorResponse, TokenStatusResponse,
};
pub use dish::{Dish, Ingredient, FOOD_NOT_FOUND_SENTINEL};
