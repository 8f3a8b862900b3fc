use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::db::queries;
use crate::models::job::{AnalysisJob, JobResults, JobStatus};

/// Persistence contract for analysis jobs.
///
/// Implementations must tolerate many jobs being updated concurrently. Writes
/// for a single job id are applied in the order they are issued.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &AnalysisJob) -> Result<(), RepositoryError>;

    async fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError>;

    /// Set the status, stamp `updated_at`, and append `error` if given.
    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Replace results and status together.
    async fn update_results(
        &self,
        job_id: &str,
        results: &JobResults,
        status: JobStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Process-local job store for local mode and tests.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, AnalysisJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &AnalysisJob) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::Duplicate(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| RepositoryError::NotFound(job_id.to_string()))?;

        job.status = status;
        job.updated_at = Utc::now();
        if let Some(error) = error {
            job.errors.push(error.to_string());
        }
        Ok(())
    }

    async fn update_results(
        &self,
        job_id: &str,
        results: &JobResults,
        status: JobStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| RepositoryError::NotFound(job_id.to_string()))?;

        job.results = Some(results.clone());
        job.status = status;
        job.updated_at = updated_at;
        Ok(())
    }
}

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, job: &AnalysisJob) -> Result<(), RepositoryError> {
        queries::insert_job(&self.pool, job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError> {
        queries::get_job(&self.pool, job_id).await
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let updated = queries::update_job_status(&self.pool, job_id, status, error).await?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn update_results(
        &self,
        job_id: &str,
        results: &JobResults,
        status: JobStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let updated = queries::update_job_results(&self.pool, job_id, results, status, updated_at).await?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    Duplicate(String),

    #[error("Stored job is malformed: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
