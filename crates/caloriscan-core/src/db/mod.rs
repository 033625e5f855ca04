//! Database module - SQLx with SQLite

use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up.
///
/// Concurrent quota consumers serialize on SQLite's write lock, so this
/// has to comfortably exceed the time a burst of increments takes.
const BUSY_TIMEOUT_SECS: u64 = 10;

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default path
    pub async fn new() -> Result<Self> {
        let db_path = get_db_path()?;
        Self::open(db_path).await
    }

    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        log::info!("Connecting to database: {}", db_path.display());

        Self::connect(&db_url).await
    }

    /// Create a new database connection from a connection string
    /// (e.g. `sqlite:/var/lib/caloriscan/caloriscan.db?mode=rwc`)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        log::info!("Running database migrations...");

        // One row per quota window; the CHECK keeps the counter inside its bounds
        // even if a buggy writer bypasses QuotaStore.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quota_counters (
                window_key TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0,
                limit_value INTEGER NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CHECK (count >= 0 AND count <= limit_value)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_quota_counters_created_at ON quota_counters(created_at)",
        )
        .execute(&self.pool)
        .await?;

        log::info!("Database migrations completed");
        Ok(())
    }
}

/// Get the database file path
pub fn get_db_path() -> Result<PathBuf> {
    // Check for environment variable override
    if let Ok(path) = std::env::var("CALORISCAN_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    // Default: use app data directory
    let dirs = directories::ProjectDirs::from("com", "caloriscan", "CaloriScan")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().join("caloriscan.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to ensure env var tests don't run in parallel
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_get_db_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("CALORISCAN_DB_PATH");
        let path = get_db_path().unwrap();
        assert!(path.to_string_lossy().contains("caloriscan.db"));
    }

    #[test]
    fn test_get_db_path_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let test_path = "/tmp/test_caloriscan.db";
        std::env::set_var("CALORISCAN_DB_PATH", test_path);
        let path = get_db_path().unwrap();
        assert_eq!(path.to_string_lossy(), test_path);
        std::env::remove_var("CALORISCAN_DB_PATH");
    }

    #[tokio::test]
    async fn test_open_runs_migrations() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("nested").join("test.db"))
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'quota_counters'",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_counter_check_constraint() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("test.db")).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO quota_counters (window_key, count, limit_value) VALUES ('k', 3, 2)",
        )
        .execute(&db.pool)
        .await;
        assert!(result.is_err(), "count above limit must be rejected");
    }
}
