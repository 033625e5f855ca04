//! Server configuration
//!
//! Every setting is a flag with an environment variable fallback, so the
//! server runs the same way from a shell, a container or a process manager.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use caloriscan_core::db::get_db_path;
use caloriscan_core::services::inference::{LlmConfig, RetryPolicy, VisionConfig, DEFAULT_OPENAI_MODEL};
use caloriscan_core::services::quota::{QuotaPolicy, QuotaWindowType, DEFAULT_QUOTA_LIMIT};

use crate::perimeter::PerimeterConfig;

pub const DEFAULT_PORT: u16 = 5002;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "caloriscan-server")]
#[command(version, about = "CaloriScan detection API", long_about = None)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind: String,

    /// SQLite connection string (takes precedence over --db-path)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// SQLite file path; `~` is expanded
    #[arg(long, env = "CALORISCAN_DB_PATH")]
    pub db_path: Option<String>,

    /// Google Cloud Vision API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Vision endpoint override
    #[arg(long, env = "VISION_BASE_URL")]
    pub vision_base_url: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chat model used for nutrition generation
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    pub openai_model: String,

    /// OpenAI-compatible endpoint override
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Detection calls allowed per quota window
    #[arg(long, env = "QUOTA_LIMIT", default_value_t = DEFAULT_QUOTA_LIMIT)]
    pub quota_limit: i64,

    /// Quota window: hourly, daily or monthly
    #[arg(long, env = "QUOTA_WINDOW", default_value = "daily")]
    pub quota_window: QuotaWindowType,

    /// Days of old quota counters to keep
    #[arg(long, env = "QUOTA_RETENTION_DAYS", default_value_t = 30)]
    pub quota_retention_days: i32,

    /// Requests per client IP per rate window on /api
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 100)]
    pub rate_limit_max: u32,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,

    /// Key the rate limit on X-Forwarded-For (only behind a trusted proxy)
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Per-attempt timeout for Vision and OpenAI calls
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    #[arg(long, env = "UPSTREAM_MAX_ATTEMPTS", default_value_t = 3)]
    pub upstream_max_attempts: u32,

    /// Largest accepted request body
    #[arg(long, env = "BODY_LIMIT_BYTES", default_value_t = DEFAULT_BODY_LIMIT_BYTES)]
    pub body_limit_bytes: usize,
}

/// Where the quota database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Url(String),
    Path(PathBuf),
}

impl ServerConfig {
    /// Fail fast on settings that would only surface on the first request
    pub fn validate(&self) -> Result<()> {
        if !has_value(&self.google_api_key) {
            bail!("GOOGLE_API_KEY is not set");
        }
        if !has_value(&self.openai_api_key) {
            bail!("OPENAI_API_KEY is not set");
        }
        if self.quota_limit < 0 {
            bail!("QUOTA_LIMIT must not be negative");
        }
        if self.rate_limit_max == 0 || self.rate_limit_window_secs == 0 {
            bail!("RATE_LIMIT_MAX and RATE_LIMIT_WINDOW_SECS must be positive");
        }
        if self.upstream_max_attempts == 0 {
            bail!("UPSTREAM_MAX_ATTEMPTS must be at least 1");
        }
        let min_retention = self.quota_window.max_days();
        if self.quota_retention_days < min_retention {
            bail!(
                "QUOTA_RETENTION_DAYS must be at least {} for a {} quota window",
                min_retention,
                self.quota_window
            );
        }
        Ok(())
    }

    pub fn db_location(&self) -> Result<DbLocation> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(DbLocation::Url(url.to_string()));
        }
        match self.db_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Ok(DbLocation::Path(PathBuf::from(
                shellexpand::tilde(path).into_owned(),
            ))),
            None => Ok(DbLocation::Path(get_db_path()?)),
        }
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy::new(self.quota_limit, self.quota_window)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.upstream_max_attempts, self.upstream_timeout())
    }

    pub fn vision_config(&self) -> VisionConfig {
        let config = VisionConfig::new(self.google_api_key.clone());
        match &self.vision_base_url {
            Some(url) => config.with_base_url(url.clone()),
            None => config,
        }
    }

    pub fn llm_config(&self) -> LlmConfig {
        let config = LlmConfig::new(self.openai_api_key.clone()).with_model(self.openai_model.clone());
        match &self.openai_base_url {
            Some(url) => config.with_base_url(url.clone()),
            None => config,
        }
    }

    pub fn perimeter(&self) -> PerimeterConfig {
        PerimeterConfig {
            max_requests: self.rate_limit_max,
            window: Duration::from_secs(self.rate_limit_window_secs),
            trust_forwarded_for: self.trust_proxy,
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["caloriscan-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--port",
            "8080",
            "--quota-limit",
            "5",
            "--quota-window",
            "hourly",
            "--rate-limit-max",
            "7",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.quota_policy(), QuotaPolicy::new(5, QuotaWindowType::Hourly));
        assert_eq!(config.perimeter().max_requests, 7);
    }

    #[test]
    fn test_retention_must_cover_window() {
        let keys = ["--google-api-key", "g", "--openai-api-key", "o"];
        let mut config = parse(&keys);

        config.quota_window = QuotaWindowType::Monthly;
        config.quota_retention_days = 30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("QUOTA_RETENTION_DAYS"));

        config.quota_retention_days = 31;
        assert!(config.validate().is_ok());

        config.quota_window = QuotaWindowType::Daily;
        config.quota_retention_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_window_rejected() {
        let result = ServerConfig::try_parse_from(["caloriscan-server", "--quota-window", "weekly"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let mut config = parse(&["--google-api-key", "g", "--openai-api-key", "o"]);
        assert!(config.validate().is_ok());

        config.openai_api_key = Some("  ".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        config.google_api_key = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_database_url_wins_over_path() {
        let config = parse(&["--database-url", "sqlite::memory:", "--db-path", "/tmp/q.db"]);
        assert_eq!(
            config.db_location().unwrap(),
            DbLocation::Url("sqlite::memory:".to_string())
        );
    }

    #[test]
    fn test_db_path_is_expanded() {
        let config = parse(&["--db-path", "/var/lib/caloriscan/quota.db"]);
        assert_eq!(
            config.db_location().unwrap(),
            DbLocation::Path(PathBuf::from("/var/lib/caloriscan/quota.db"))
        );
    }
}
