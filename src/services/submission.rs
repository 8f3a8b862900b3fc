use tracing::{error, info};

use crate::db::repository::{JobRepository, RepositoryError};
use crate::models::job::{AnalysisJob, JobStatus};
use crate::models::request::ContentAnalysisRequest;
use crate::services::queue::{JobDispatcher, QueueError, QueuedJob};

/// Create a PENDING job and hand it to the dispatcher.
///
/// A failed handoff marks the job FAILED with the cause before returning
/// [`SubmitError::QueueUnavailable`].
pub async fn submit_job(
    jobs: &dyn JobRepository,
    dispatcher: &dyn JobDispatcher,
    request: &ContentAnalysisRequest,
) -> Result<AnalysisJob, SubmitError> {
    let job = AnalysisJob::pending(request).map_err(RepositoryError::Serialize)?;
    jobs.create(&job).await?;
    metrics::counter!("content_analysis_jobs_submitted_total").increment(1);

    let message = QueuedJob {
        job_id: job.id.clone(),
        payload: job.payload.clone(),
    };

    if let Err(e) = dispatcher.publish(&message).await {
        error!(job_id = %job.id, error = %e, "Failed to enqueue analysis job");
        metrics::counter!("content_analysis_dispatch_failures_total").increment(1);
        jobs.update_status(&job.id, JobStatus::Failed, Some(&e.to_string()))
            .await?;
        return Err(SubmitError::QueueUnavailable {
            job_id: job.id,
            source: e,
        });
    }

    info!(
        job_id = %job.id,
        campaign_id = %job.campaign_id,
        creator_id = %job.creator_id,
        "Content analysis job submitted"
    );

    Ok(job)
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Failed to enqueue analysis job {job_id}: {source}")]
    QueueUnavailable { job_id: String, source: QueueError },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
