use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::db::repository::RepositoryError;
use crate::models::job::{AnalysisJob, JobResults, JobStatus};

/// Insert a new analysis job
pub async fn insert_job(pool: &PgPool, job: &AnalysisJob) -> Result<(), RepositoryError> {
    let results = job.results.as_ref().map(serde_json::to_value).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO content_analysis_jobs
            (id, campaign_id, creator_id, status, payload, results, errors, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&job.id)
    .bind(&job.campaign_id)
    .bind(&job.creator_id)
    .bind(job.status.to_string())
    .bind(&job.payload)
    .bind(results)
    .bind(&job.errors)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError> {
    let row = sqlx::query(
        r#"
        SELECT id, campaign_id, creator_id, status, payload, results, errors,
               created_at, updated_at
        FROM content_analysis_jobs
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| job_from_row(&r)).transpose()
}

/// Update job status, appending an error when given. Returns rows affected.
pub async fn update_job_status(
    pool: &PgPool,
    job_id: &str,
    status: JobStatus,
    error: Option<&str>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r#"
        UPDATE content_analysis_jobs
        SET status = $1,
            errors = CASE WHEN $2::TEXT IS NULL THEN errors ELSE array_append(errors, $2::TEXT) END,
            updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(status.to_string())
    .bind(error)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Replace job results and status in one statement. Returns rows affected.
pub async fn update_job_results(
    pool: &PgPool,
    job_id: &str,
    results: &JobResults,
    status: JobStatus,
    updated_at: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r#"
        UPDATE content_analysis_jobs
        SET status = $1,
            results = $2,
            updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(status.to_string())
    .bind(serde_json::to_value(results)?)
    .bind(updated_at)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn job_from_row(r: &PgRow) -> Result<AnalysisJob, RepositoryError> {
    let status_str: String = r.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| RepositoryError::Corrupt(format!("unknown status '{status_str}'")))?;

    let results: Option<serde_json::Value> = r.try_get("results")?;
    let results = results
        .map(serde_json::from_value::<JobResults>)
        .transpose()?;

    Ok(AnalysisJob {
        id: r.try_get("id")?,
        campaign_id: r.try_get("campaign_id")?,
        creator_id: r.try_get("creator_id")?,
        status,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
        payload: r.try_get("payload")?,
        results,
        errors: r.try_get("errors")?,
    })
}
