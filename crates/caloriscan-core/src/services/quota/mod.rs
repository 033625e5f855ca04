//! Quota tracking module
//!
//! A bounded call counter shared by every detection request. The counter
//! for a window is created on first use and never reset in place; a new
//! window simply gets a new key.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ QuotaPolicy { limit, window }                           │
//! │   - current_key()        -> "day:2026-10-19"            │
//! │   - current_window_end() -> reset time                  │
//! └─────────────────────────────────────────────────────────┘
//!          │ window key
//!          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │ trait QuotaLedger                                       │
//! │   - try_consume(key) -> Consumed{remaining} | Exhausted │
//! │   - peek(key)        -> remaining                       │
//! └─────────────────────────────────────────────────────────┘
//!          │
//!     ┌────┴─────┐
//!     ▼          ▼
//! ┌────────┐ ┌────────┐
//! │ SQLite │ │ Memory │
//! │ Store  │ │ Ledger │
//! └────────┘ └────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use caloriscan_core::services::quota::{QuotaLedger, QuotaPolicy, QuotaStore};
//!
//! let policy = QuotaPolicy::default();
//! let store = QuotaStore::new(db.pool.clone(), policy.limit);
//!
//! match store.try_consume(&policy.current_key()).await? {
//!     ConsumeOutcome::Consumed { remaining } => { /* call upstream */ }
//!     ConsumeOutcome::Exhausted => { /* 429 */ }
//! }
//! ```

pub mod ledger;
pub mod memory;
pub mod store;
pub mod types;

// Re-export main types
pub use types::{
    ConsumeOutcome, QuotaCounter, QuotaPolicy, QuotaWindowType, DEFAULT_QUOTA_LIMIT,
};

// Re-export ledger trait and error
pub use ledger::{QuotaError, QuotaLedger};

// Re-export backends
pub use memory::MemoryQuotaLedger;
pub use store::{QuotaStore, StoredQuotaCounter};
