//! Quota storage layer
//!
//! Persists one counter row per window in SQLite. Consumption is a single
//! conditional `UPDATE ... WHERE count < limit_value RETURNING`, so the
//! check and the increment can never be split by another writer.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use super::ledger::{QuotaError, QuotaLedger};
use super::types::{ConsumeOutcome, QuotaCounter};

// ============================================================================
// Database Row Types
// ============================================================================

/// Database row representation of a quota counter
///
/// This struct maps directly to the `quota_counters` table schema.
#[derive(Debug, Clone, FromRow)]
pub struct StoredQuotaCounter {
    pub window_key: String,
    pub count: i64,
    pub limit_value: i64,
    /// When the window was first used (SQLite datetime text)
    pub created_at: String,
    pub updated_at: String,
}

impl StoredQuotaCounter {
    /// Convert database row to QuotaCounter
    ///
    /// Returns `None` if the row violates `0 <= count <= limit`.
    pub fn to_quota_counter(&self) -> Option<QuotaCounter> {
        if self.count < 0 || self.count > self.limit_value {
            log::warn!(
                "[quota:store] Counter {} out of bounds: {}/{}",
                self.window_key,
                self.count,
                self.limit_value
            );
            return None;
        }

        Some(QuotaCounter {
            window_key: self.window_key.clone(),
            count: self.count,
            limit: self.limit_value,
        })
    }
}

// ============================================================================
// QuotaStore
// ============================================================================

/// SQLite-backed quota ledger
#[derive(Clone)]
pub struct QuotaStore {
    pool: SqlitePool,
    limit: i64,
}

impl QuotaStore {
    /// Create a new QuotaStore; `limit` is applied to counters created from now on
    pub fn new(pool: SqlitePool, limit: i64) -> Self {
        Self {
            pool,
            limit: limit.max(0),
        }
    }

    /// Fetch the stored counter for a window, if it has been used
    pub async fn get_counter(&self, window_key: &str) -> Result<Option<QuotaCounter>, QuotaError> {
        let row = sqlx::query_as::<_, StoredQuotaCounter>(
            r#"
            SELECT window_key, count, limit_value, created_at, updated_at
            FROM quota_counters
            WHERE window_key = ?
            "#,
        )
        .bind(window_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row
                .to_quota_counter()
                .map(Some)
                .ok_or_else(|| QuotaError::Corrupt(window_key.to_string())),
            None => Ok(None),
        }
    }

    /// Delete counters for windows first used more than `days` ago.
    /// `live_window_key` is the window currently being gated; it is kept
    /// whatever its age, so pruning can never reset an open window.
    ///
    /// # Returns
    /// Number of rows deleted.
    pub async fn cleanup(&self, days: i32, live_window_key: &str) -> Result<u64, QuotaError> {
        let days = days.max(0);
        log::info!("[quota:store] Cleaning up counters older than {} days", days);

        let result = sqlx::query(
            r#"
            DELETE FROM quota_counters
            WHERE created_at < datetime('now', '-' || ? || ' days')
              AND window_key != ?
            "#,
        )
        .bind(days)
        .bind(live_window_key)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        log::info!("[quota:store] Deleted {} old quota counters", deleted);

        Ok(deleted)
    }
}

#[async_trait]
impl QuotaLedger for QuotaStore {
    fn limit(&self) -> i64 {
        self.limit
    }

    async fn try_consume(&self, window_key: &str) -> Result<ConsumeOutcome, QuotaError> {
        // Creating the row is idempotent and never touches an existing count.
        sqlx::query(
            r#"
            INSERT INTO quota_counters (window_key, count, limit_value)
            VALUES (?, 0, ?)
            ON CONFLICT(window_key) DO NOTHING
            "#,
        )
        .bind(window_key)
        .bind(self.limit)
        .execute(&self.pool)
        .await?;

        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE quota_counters
            SET count = count + 1, updated_at = CURRENT_TIMESTAMP
            WHERE window_key = ? AND count < limit_value
            RETURNING count, limit_value
            "#,
        )
        .bind(window_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((count, limit)) => {
                let remaining = limit - count;
                log::debug!(
                    "[quota:store] Consumed {} -> {}/{} ({} remaining)",
                    window_key,
                    count,
                    limit,
                    remaining
                );
                Ok(ConsumeOutcome::Consumed { remaining })
            }
            None => {
                log::info!("[quota:store] Window {} exhausted", window_key);
                Ok(ConsumeOutcome::Exhausted)
            }
        }
    }

    async fn peek(&self, window_key: &str) -> Result<i64, QuotaError> {
        Ok(match self.get_counter(window_key).await? {
            Some(counter) => counter.remaining(),
            None => self.limit,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
