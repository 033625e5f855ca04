//! Quota ledger trait and error types
//!
//! Defines the interface every quota backend must implement.

use async_trait::async_trait;
use thiserror::Error;

use super::types::ConsumeOutcome;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading or updating a quota counter
#[derive(Error, Debug)]
pub enum QuotaError {
    /// The persistence layer failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored counter violates its invariant
    #[error("Corrupt counter for window {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for QuotaError {
    fn from(err: sqlx::Error) -> Self {
        QuotaError::Storage(err.to_string())
    }
}

// ============================================================================
// Ledger Trait
// ============================================================================

/// A bounded call counter per window.
///
/// Implementations must make [`QuotaLedger::try_consume`] a single atomic
/// check-and-increment: no caller may ever observe `count > limit`, even
/// when many callers race on a counter with one unit left.
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use caloriscan_core::services::quota::{ConsumeOutcome, QuotaError, QuotaLedger};
///
/// struct Unlimited;
///
/// #[async_trait]
/// impl QuotaLedger for Unlimited {
///     fn limit(&self) -> i64 { i64::MAX }
///
///     async fn try_consume(&self, _window_key: &str) -> Result<ConsumeOutcome, QuotaError> {
///         Ok(ConsumeOutcome::Consumed { remaining: i64::MAX })
///     }
///
///     async fn peek(&self, _window_key: &str) -> Result<i64, QuotaError> {
///         Ok(i64::MAX)
///     }
/// }
/// ```
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Capacity given to a window's counter when it is first used
    fn limit(&self) -> i64;

    /// Take one unit from the window's counter if any is left.
    ///
    /// Creates the counter on first use. `Exhausted` leaves the count
    /// unchanged.
    async fn try_consume(&self, window_key: &str) -> Result<ConsumeOutcome, QuotaError>;

    /// Remaining capacity for the window, without mutating anything
    async fn peek(&self, window_key: &str) -> Result<i64, QuotaError>;
}

// ============================================================================
// Tests
// ============================================================================
