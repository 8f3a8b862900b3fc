use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{AppConfig, QueueMode};
use crate::db::{
    self,
    repository::{InMemoryJobRepository, JobRepository, PgJobRepository},
};
use crate::services::{
    orchestrator::JobOrchestrator,
    queue::{InProcessDispatcher, JobDispatcher, QueueError, RedisJobQueue},
    sightengine::{FakeScorer, ModerationScorer, ScorerError, SightengineClient},
    summary::{ClaudeSummaryClient, FakeSummarizer, Summarizer, SummaryError},
};

/// Capacity of the in-process job channel.
const LOCAL_QUEUE_CAPACITY: usize = 256;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRepository>,
    pub dispatcher: Arc<dyn JobDispatcher>,
}

impl AppState {
    pub fn new(jobs: Arc<dyn JobRepository>, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self { jobs, dispatcher }
    }

    /// Wire the API process from configuration.
    ///
    /// In local mode the returned handle is the in-process consumer loop.
    pub async fn from_config(
        config: &AppConfig,
    ) -> Result<(Self, Option<JoinHandle<()>>), BootstrapError> {
        let jobs = connect_job_store(config).await?;

        match config.queue_mode {
            QueueMode::Local => {
                let orchestrator = Arc::new(build_orchestrator(config, Arc::clone(&jobs))?);
                let (dispatcher, consumer) = InProcessDispatcher::spawn(orchestrator, LOCAL_QUEUE_CAPACITY);
                Ok((Self::new(jobs, Arc::new(dispatcher)), Some(consumer)))
            }
            QueueMode::Redis => {
                let queue = RedisJobQueue::new(redis_url(config)?)?;
                Ok((Self::new(jobs, Arc::new(queue)), None))
            }
        }
    }
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store.
pub async fn connect_job_store(config: &AppConfig) -> Result<Arc<dyn JobRepository>, BootstrapError> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let pool = db::init_pool(url, config.database_max_connections).await?;
            tracing::info!("Running database migrations");
            db::run_migrations(&pool).await?;
            Ok(Arc::new(PgJobRepository::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; jobs are kept in memory only");
            Ok(Arc::new(InMemoryJobRepository::new()))
        }
    }
}

/// Build the orchestrator with real or fake collaborators.
pub fn build_orchestrator(
    config: &AppConfig,
    jobs: Arc<dyn JobRepository>,
) -> Result<JobOrchestrator, BootstrapError> {
    let (scorer, summarizer): (Arc<dyn ModerationScorer>, Arc<dyn Summarizer>) = if config.use_fake_ai {
        tracing::warn!("USE_FAKE_AI enabled; moderation and summaries are simulated");
        (Arc::new(FakeScorer), Arc::new(FakeSummarizer))
    } else {
        let mut scorer = SightengineClient::new(
            required(&config.sightengine_api_user, "SIGHTENGINE_API_USER")?,
            required(&config.sightengine_api_secret, "SIGHTENGINE_API_SECRET")?,
            Duration::from_secs(config.sightengine_timeout_secs),
        )?;
        if let Some(url) = &config.sightengine_api_url {
            scorer = scorer.with_base_url(url.as_str());
        }
        let summarizer = ClaudeSummaryClient::new(
            &config.claude_api_url,
            required(&config.claude_api_key, "CLAUDE_API_KEY")?,
            &config.claude_model,
        )?;
        (Arc::new(scorer), Arc::new(summarizer))
    };

    Ok(JobOrchestrator::new(jobs, scorer, summarizer).with_media_concurrency(config.media_concurrency))
}

pub fn redis_url(config: &AppConfig) -> Result<&str, BootstrapError> {
    required(&config.redis_url, "REDIS_URL")
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, BootstrapError> {
    value.as_deref().ok_or(BootstrapError::MissingSetting(name))
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("Database setup failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_config() -> AppConfig {
        envy::from_iter([("USE_FAKE_AI".to_string(), "true".to_string())]).unwrap()
    }

    #[tokio::test]
    async fn test_local_mode_wires_in_memory_pipeline() {
        let (state, consumer) = AppState::from_config(&fake_config()).await.unwrap();
        assert!(consumer.is_some());
        assert!(state.jobs.health_check().await.is_ok());
        assert!(state.dispatcher.health_check().await.is_ok());
    }

    #[test]
    fn test_real_collaborators_need_credentials() {
        let mut config = fake_config();
        config.use_fake_ai = false;
        let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        assert!(matches!(
            build_orchestrator(&config, jobs),
            Err(BootstrapError::MissingSetting("SIGHTENGINE_API_USER"))
        ));
    }
}
