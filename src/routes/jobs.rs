use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{ErrorResponse, JobCreateResponse, JobStatusResponse};
use crate::models::request::ContentAnalysisRequest;
use crate::services::submission::{submit_job, SubmitError};

/// POST /v1/content-analysis/jobs — accept content for async analysis.
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<ContentAnalysisRequest>,
) -> Result<(StatusCode, Json<JobCreateResponse>), ApiError> {
    request
        .validate()
        .map_err(|report| ApiError::Validation(report.to_string()))?;

    let job = submit_job(state.jobs.as_ref(), state.dispatcher.as_ref(), &request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobCreateResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// GET /v1/content-analysis/jobs/{job_id} — current status and results.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state
        .jobs
        .get(&job_id)
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Failed to load job");
            ApiError::Internal
        })?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(job.into()))
}

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound,
    QueueUnavailable,
    Internal,
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::QueueUnavailable { .. } => ApiError::QueueUnavailable,
            SubmitError::Repository(e) => {
                tracing::error!(error = %e, "Failed to persist submitted job");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(report) => (StatusCode::UNPROCESSABLE_ENTITY, report),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Job not found".to_string()),
            ApiError::QueueUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to enqueue analysis job".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
