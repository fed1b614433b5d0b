//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_SNAPSHOT_MAX_AGE_SECS, DEFAULT_SUBMIT_MAX_ATTEMPTS, DEFAULT_SUBMIT_RETRY_DELAY_MS};
use crate::services::retry::{Backoff, RetryPolicy};
use crate::services::snapshot::SnapshotCache;
use crate::types::ColumnMapping;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Attempts per submission, including the first
    pub submit_max_attempts: u32,

    /// Base delay between submission attempts
    pub submit_retry_delay: Duration,

    pub submit_backoff: Backoff,

    /// How long an existing-facts snapshot may be reused (zero disables)
    pub snapshot_max_age: Duration,

    /// JSON file overriding the built-in column mapping
    pub column_map_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let nats_user = std::env::var("NATS_USER").ok();
        let nats_password = std::env::var("NATS_PASSWORD").ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let submit_max_attempts = parse_var("SUBMIT_MAX_ATTEMPTS", DEFAULT_SUBMIT_MAX_ATTEMPTS)?;
        if submit_max_attempts == 0 {
            anyhow::bail!("SUBMIT_MAX_ATTEMPTS must be at least 1");
        }

        let submit_retry_delay = Duration::from_millis(parse_var("SUBMIT_RETRY_DELAY_MS", DEFAULT_SUBMIT_RETRY_DELAY_MS)?);

        let backoff_name = std::env::var("SUBMIT_BACKOFF").unwrap_or_else(|_| "linear".to_string());
        let submit_backoff = parse_backoff(&backoff_name, submit_retry_delay)?;

        let snapshot_max_age = Duration::from_secs(parse_var("SNAPSHOT_MAX_AGE_SECS", DEFAULT_SNAPSHOT_MAX_AGE_SECS)?);

        let column_map_path = std::env::var("COLUMN_MAP_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            nats_url,
            nats_user,
            nats_password,
            database_url,
            submit_max_attempts,
            submit_retry_delay,
            submit_backoff,
            snapshot_max_age,
            column_map_path,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.submit_max_attempts, self.submit_backoff)
    }

    pub fn snapshot_cache(&self) -> SnapshotCache {
        SnapshotCache::new(self.snapshot_max_age)
    }

    /// Active column mapping, validated
    pub fn column_mapping(&self) -> Result<ColumnMapping> {
        ColumnMapping::load_or_default(self.column_map_path.as_deref())
    }

    pub fn column_map_source(&self) -> String {
        self.column_map_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in default".to_string())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", name, raw))
}

/// Only `linear` and `exponential` are accepted for submissions
fn parse_backoff(name: &str, base: Duration) -> Result<Backoff> {
    match Backoff::from_name(name, base) {
        Some(backoff @ (Backoff::Linear(_) | Backoff::Exponential { .. })) => Ok(backoff),
        _ => anyhow::bail!("SUBMIT_BACKOFF must be 'linear' or 'exponential', got {:?}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backoff_accepts_linear_and_exponential() {
        let base = Duration::from_millis(2000);
        assert_eq!(parse_backoff("linear", base).unwrap(), Backoff::Linear(base));
        assert_eq!(
            parse_backoff(" Exponential ", base).unwrap(),
            Backoff::Exponential { base, max: base * 8 }
        );
    }

    #[test]
    fn test_parse_backoff_rejects_other_names() {
        let base = Duration::from_millis(2000);
        assert!(parse_backoff("fixed", base).is_err());
        assert!(parse_backoff("random", base).is_err());
    }

    #[test]
    fn test_parse_value_reports_variable_name() {
        let parsed: u32 = parse_value("SUBMIT_MAX_ATTEMPTS", " 5 ").unwrap();
        assert_eq!(parsed, 5);

        let err = parse_value::<u32>("SUBMIT_MAX_ATTEMPTS", "three").unwrap_err();
        assert!(err.to_string().contains("SUBMIT_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_helpers_build_from_config() {
        let config = Config {
            nats_url: "nats://localhost:4222".into(),
            nats_user: None,
            nats_password: None,
            database_url: "postgres://test".into(),
            submit_max_attempts: 4,
            submit_retry_delay: Duration::from_millis(10),
            submit_backoff: Backoff::Linear(Duration::from_millis(10)),
            snapshot_max_age: Duration::from_secs(60),
            column_map_path: None,
        };

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(config.snapshot_cache().max_age(), Duration::from_secs(60));
        assert_eq!(config.column_mapping().unwrap(), ColumnMapping::default());
        assert_eq!(config.column_map_source(), "built-in default");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults_when_unset() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::remove_var("SUBMIT_MAX_ATTEMPTS");
        std::env::remove_var("SUBMIT_BACKOFF");

        let config = Config::from_env().unwrap();
        assert_eq!(config.submit_max_attempts, DEFAULT_SUBMIT_MAX_ATTEMPTS);
        assert_eq!(config.submit_backoff, Backoff::Linear(Duration::from_millis(DEFAULT_SUBMIT_RETRY_DELAY_MS)));
        assert_eq!(config.nats_url, "nats://localhost:4222");
    }
}
