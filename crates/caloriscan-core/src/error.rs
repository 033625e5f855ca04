//! Unified error handling for caloriscan-core
//!
//! Domain failures have their own enums (`QuotaError`, `InferenceError`,
//! `DetectionError`, `CaptureError`, `ClientError`); this one covers
//! opening and migrating the database.

use thiserror::Error;

/// Core error type for caloriscan-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for caloriscan-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
