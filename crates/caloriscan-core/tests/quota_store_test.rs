//! Integration tests for the SQLite-backed quota ledger

use std::sync::Arc;

use caloriscan_core::db::Database;
use caloriscan_core::services::quota::{ConsumeOutcome, QuotaLedger, QuotaStore};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db = Database::open(db_path).await.expect("Failed to create test database");
    (db, temp_dir)
}

#[tokio::test]
async fn test_consume_up_to_limit() {
    let (db, _temp_dir) = create_test_db().await;
    let store = QuotaStore::new(db.pool.clone(), 3);
    let key = "day:2026-10-19";

    for c in 0..3 {
        let outcome = store.try_consume(key).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::Consumed { remaining: 3 - (c + 1) });
    }

    assert_eq!(store.try_consume(key).await.unwrap(), ConsumeOutcome::Exhausted);

    let counter = store.get_counter(key).await.unwrap().unwrap();
    assert_eq!(counter.count, 3);
    assert_eq!(counter.limit, 3);
}

#[tokio::test]
async fn test_exhausted_leaves_count_unchanged() {
    let (db, _temp_dir) = create_test_db().await;
    let store = QuotaStore::new(db.pool.clone(), 1);
    let key = "day:2026-10-19";

    store.try_consume(key).await.unwrap();
    for _ in 0..5 {
        assert_eq!(store.try_consume(key).await.unwrap(), ConsumeOutcome::Exhausted);
    }

    assert_eq!(store.get_counter(key).await.unwrap().unwrap().count, 1);
    assert_eq!(store.peek(key).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_consumers_single_unit() {
    let (db, _temp_dir) = create_test_db().await;
    let key = "day:2026-10-19";

    // Leave exactly one unit of capacity.
    let store = Arc::new(QuotaStore::new(db.pool.clone(), 10));
    for _ in 0..9 {
        store.try_consume(key).await.unwrap();
    }

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.try_consume(key).await.unwrap() })
        })
        .collect();

    let mut consumed = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), ConsumeOutcome::Consumed { .. }) {
            consumed += 1;
        }
    }

    assert_eq!(consumed, 1);
    assert_eq!(store.get_counter(key).await.unwrap().unwrap().count, 10);
}

#[tokio::test]
async fn test_windows_are_independent() {
    let (db, _temp_dir) = create_test_db().await;
    let store = QuotaStore::new(db.pool.clone(), 1);

    assert!(matches!(
        store.try_consume("day:2026-10-18").await.unwrap(),
        ConsumeOutcome::Consumed { remaining: 0 }
    ));
    assert!(matches!(
        store.try_consume("day:2026-10-19").await.unwrap(),
        ConsumeOutcome::Consumed { remaining: 0 }
    ));
}

#[tokio::test]
async fn test_peek_does_not_create_or_consume() {
    let (db, _temp_dir) = create_test_db().await;
    let store = QuotaStore::new(db.pool.clone(), 600);
    let key = "day:2026-10-19";

    assert_eq!(store.peek(key).await.unwrap(), 600);
    assert!(store.get_counter(key).await.unwrap().is_none());

    store.try_consume(key).await.unwrap();
    assert_eq!(store.peek(key).await.unwrap(), 599);
    assert_eq!(store.peek(key).await.unwrap(), 599);
}

#[tokio::test]
async fn test_counter_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quota.db");
    let key = "day:2026-10-19";

    {
        let db = Database::open(db_path.clone()).await.unwrap();
        let store = QuotaStore::new(db.pool.clone(), 5);
        store.try_consume(key).await.unwrap();
        store.try_consume(key).await.unwrap();
        db.pool.close().await;
    }

    let db = Database::open(db_path).await.unwrap();
    let store = QuotaStore::new(db.pool.clone(), 5);
    assert_eq!(store.peek(key).await.unwrap(), 3);
}

#[tokio::test]
async fn test_cleanup_removes_old_windows() {
    let (db, _temp_dir) = create_test_db().await;
    let store = QuotaStore::new(db.pool.clone(), 5);

    store.try_consume("day:2026-10-19").await.unwrap();
    sqlx::query(
        "INSERT INTO quota_counters (window_key, count, limit_value, created_at) \
         VALUES ('day:2026-01-01', 5, 5, datetime('now', '-60 days'))",
    )
    .execute(&db.pool)
    .await
    .unwrap();

    let deleted = store.cleanup(30, "day:2026-10-19").await.unwrap();
    assert_eq!(deleted, 1);
    assert!(store.get_counter("day:2026-01-01").await.unwrap().is_none());
    assert!(store.get_counter("day:2026-10-19").await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_keeps_live_window() {
    let (db, _temp_dir) = create_test_db().await;
    let store = QuotaStore::new(db.pool.clone(), 2);
    let key = "month:2026-10";

    store.try_consume(key).await.unwrap();
    store.try_consume(key).await.unwrap();
    // Day 31 of a monthly window: older than the retention period, still open.
    sqlx::query("UPDATE quota_counters SET created_at = datetime('now', '-30 days', '-1 minutes')")
        .execute(&db.pool)
        .await
        .unwrap();

    assert_eq!(store.cleanup(30, key).await.unwrap(), 0);
    assert_eq!(store.cleanup(0, key).await.unwrap(), 0);
    assert_eq!(store.try_consume(key).await.unwrap(), ConsumeOutcome::Exhausted);
    assert_eq!(store.peek(key).await.unwrap(), 0);
}
