use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::{AnalysisJob, JobResults, JobStatus};

/// Response after submitting content for analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobCreateResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Response for querying job status.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub results: Option<JobResults>,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AnalysisJob> for JobStatusResponse {
    fn from(job: AnalysisJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            results: job.results,
            errors: job.errors,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
