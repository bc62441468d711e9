/// Configuration management for Sphere Service
///
/// Loads configuration from environment variables.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Which store backend to open
    pub store: StoreBackend,
    /// Database configuration (required for the postgres backend)
    pub database: Option<DatabaseConfig>,
    /// Cross-entity repair behaviour
    pub integrity: IntegrityConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port for health checks and metrics
    pub http_port: u16,
    /// Emit JSON log lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Bounds for the idempotent retry phases and the background repair job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Retries of the comment sweep / follow rollback before escalating
    pub max_retries: u32,
    /// First backoff between retries, in milliseconds
    pub initial_backoff_ms: u64,
    /// Comments deleted per sweep batch
    pub sweep_batch: usize,
    /// Run the background repair job
    pub repair_enabled: bool,
    /// Seconds between repair cycles
    pub repair_interval_secs: u64,
}

impl IntegrityConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            ..RetryConfig::default()
        }
    }

    pub fn repair_interval(&self) -> Duration {
        Duration::from_secs(self.repair_interval_secs)
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            sweep_batch: default_sweep_batch(),
            repair_enabled: true,
            repair_interval_secs: default_repair_interval_secs(),
        }
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_sweep_batch() -> usize {
    500
}

fn default_repair_interval_secs() -> u64 {
    300
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_parse("PORT").unwrap_or(8010),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        let store = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("Unknown STORE_BACKEND `{}` (expected postgres|memory)", other),
        };

        let database = match store {
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL environment variable not set")?,
                max_connections: env_parse("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(default_max_connections),
                min_connections: env_parse("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(default_min_connections),
            }),
            StoreBackend::Memory => None,
        };

        let integrity = IntegrityConfig {
            max_retries: env_parse("CASCADE_MAX_RETRIES").unwrap_or_else(default_max_retries),
            initial_backoff_ms: env_parse("CASCADE_INITIAL_BACKOFF_MS")
                .unwrap_or_else(default_initial_backoff_ms),
            sweep_batch: env_parse::<usize>("CASCADE_SWEEP_BATCH")
                .filter(|n| *n > 0)
                .unwrap_or_else(default_sweep_batch),
            repair_enabled: env_flag("INTEGRITY_REPAIR_ENABLED", true),
            repair_interval_secs: env_parse("INTEGRITY_REPAIR_INTERVAL_SECS")
                .unwrap_or_else(default_repair_interval_secs),
        };

        Ok(Config {
            app,
            store,
            database,
            integrity,
        })
    }
}
