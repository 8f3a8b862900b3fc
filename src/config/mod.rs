use std::net::SocketAddr;

use serde::Deserialize;

use crate::services::summary::{DEFAULT_CLAUDE_MODEL, DEFAULT_CLAUDE_URL};

/// Where submitted jobs are handed off for processing.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Run jobs on tokio tasks inside the API process.
    #[default]
    Local,
    /// Push jobs onto Redis for the `worker` binary.
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment label, used in logs.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub queue_mode: QueueMode,

    /// PostgreSQL connection string. Jobs are kept in memory when unset.
    pub database_url: Option<String>,

    /// Upper bound on pooled Postgres connections per process.
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// Redis connection string for the job queue
    pub redis_url: Option<String>,

    pub sightengine_api_user: Option<String>,

    pub sightengine_api_secret: Option<String>,

    /// Overrides the Sightengine endpoint (staging or a local stub).
    pub sightengine_api_url: Option<String>,

    #[serde(default = "default_sightengine_timeout_secs")]
    pub sightengine_timeout_secs: u64,

    pub claude_api_key: Option<String>,

    #[serde(default = "default_claude_model")]
    pub claude_model: String,

    #[serde(default = "default_claude_api_url")]
    pub claude_api_url: String,

    /// Use deterministic offline scorer and summarizer.
    #[serde(default)]
    pub use_fake_ai: bool,

    /// Prometheus scrape address served by each worker process.
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,

    /// Media items analyzed concurrently within one job (1 = sequential).
    #[serde(default = "default_media_concurrency")]
    pub media_concurrency: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_environment() -> String {
    "local".to_string()
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_sightengine_timeout_secs() -> u64 {
    10
}

fn default_claude_model() -> String {
    DEFAULT_CLAUDE_MODEL.to_string()
}

fn default_claude_api_url() -> String {
    DEFAULT_CLAUDE_URL.to_string()
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_media_concurrency() -> usize {
    1
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.use_fake_ai {
            for (name, value) in [
                ("SIGHTENGINE_API_USER", &self.sightengine_api_user),
                ("SIGHTENGINE_API_SECRET", &self.sightengine_api_secret),
                ("CLAUDE_API_KEY", &self.claude_api_key),
            ] {
                if value.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Missing(name));
                }
            }
        }

        if self.queue_mode == QueueMode::Redis {
            if self.redis_url.is_none() {
                return Err(ConfigError::Missing("REDIS_URL"));
            }
            if self.database_url.is_none() {
                return Err(ConfigError::Invalid(
                    "QUEUE_MODE=redis requires DATABASE_URL so the worker can see submitted jobs".to_string(),
                ));
            }
        }

        if self.media_concurrency == 0 {
            return Err(ConfigError::Invalid("MEDIA_CONCURRENCY must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Checks for the Redis worker, on top of [`AppConfig::validate`].
    ///
    /// A worker reads job records written by the API, so it always needs the
    /// shared Postgres store and the Redis queue, whatever `QUEUE_MODE` says.
    /// Returns the metrics listener address.
    pub fn validate_worker(&self) -> Result<SocketAddr, ConfigError> {
        self.validate()?;

        if self.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        self.worker_metrics_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "WORKER_METRICS_ADDR '{}' is not a socket address",
                self.worker_metrics_addr
            ))
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
