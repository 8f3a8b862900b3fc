use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod jobs;
pub mod metrics;

/// API routes without the metrics endpoint or transport layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/v1/content-analysis/jobs", post(jobs::create_job))
        .route("/v1/content-analysis/jobs/{job_id}", get(jobs::get_job))
        .with_state(state)
}
