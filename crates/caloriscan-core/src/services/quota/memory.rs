//! In-process quota ledger
//!
//! Same contract as [`super::QuotaStore`] without persistence. Used by tests
//! and by deployments that accept losing the count on restart.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::ledger::{QuotaError, QuotaLedger};
use super::types::ConsumeOutcome;

/// Mutex-guarded counters; the lock is held only for the check-and-increment
#[derive(Debug, Default)]
pub struct MemoryQuotaLedger {
    limit: i64,
    counters: Mutex<HashMap<String, i64>>,
}

impl MemoryQuotaLedger {
    pub fn new(limit: i64) -> Self {
        Self {
            limit: limit.max(0),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a window's count, clamped to the limit
    pub fn with_count(self, window_key: &str, count: i64) -> Self {
        if let Ok(mut counters) = self.counters.lock() {
            counters.insert(window_key.to_string(), count.clamp(0, self.limit));
        }
        self
    }

    /// Current count for a window (0 if unused)
    pub fn count(&self, window_key: &str) -> i64 {
        self.counters
            .lock()
            .map(|c| c.get(window_key).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    fn limit(&self) -> i64 {
        self.limit
    }

    async fn try_consume(&self, window_key: &str) -> Result<ConsumeOutcome, QuotaError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| QuotaError::Storage("quota lock poisoned".to_string()))?;

        let count = counters.entry(window_key.to_string()).or_insert(0);
        if *count >= self.limit {
            return Ok(ConsumeOutcome::Exhausted);
        }
        *count += 1;
        Ok(ConsumeOutcome::Consumed {
            remaining: self.limit - *count,
        })
    }

    async fn peek(&self, window_key: &str) -> Result<i64, QuotaError> {
        Ok((self.limit - self.count(window_key)).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_consume_until_exhausted() {
        let ledger = MemoryQuotaLedger::new(2);
        assert_eq!(
            ledger.try_consume("w").await.unwrap(),
            ConsumeOutcome::Consumed { remaining: 1 }
        );
        assert_eq!(
            ledger.try_consume("w").await.unwrap(),
            ConsumeOutcome::Consumed { remaining: 0 }
        );
        assert_eq!(ledger.try_consume("w").await.unwrap(), ConsumeOutcome::Exhausted);
        assert_eq!(ledger.count("w"), 2);
        assert_eq!(ledger.peek("w").await.unwrap(), 0);
        assert_eq!(ledger.peek("other").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_consume_single_unit() {
        let ledger = Arc::new(MemoryQuotaLedger::new(10).with_count("w", 9));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.try_consume("w").await.unwrap() })
            })
            .collect();

        let mut consumed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ConsumeOutcome::Consumed { .. }) {
                consumed += 1;
            }
        }

        assert_eq!(consumed, 1);
        assert_eq!(ledger.count("w"), 10);
    }
}
