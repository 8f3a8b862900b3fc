use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::moderation::{MediaModerationResult, VisualSafetyReport};
use crate::models::request::ContentAnalysisRequest;

/// Status of a content analysis job.
///
/// The rendered names are part of the public API and stored verbatim in the
/// database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl JobStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::CompletedWithWarnings | JobStatus::Failed
        )
    }
}

/// Final results bundle persisted at the end of a processing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResults {
    pub visual: VisualSafetyReport,
    pub media: Vec<MediaModerationResult>,
    pub summary: String,
}

/// A content analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub campaign_id: String,
    pub creator_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Snapshot of the submitted request; never modified after creation.
    pub payload: serde_json::Value,
    pub results: Option<JobResults>,
    pub errors: Vec<String>,
}

impl AnalysisJob {
    /// Build a fresh PENDING job for a validated request.
    pub fn pending(request: &ContentAnalysisRequest) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            id: new_job_id(),
            campaign_id: request.campaign_id.clone(),
            creator_id: request.creator_id.clone(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            payload: serde_json::to_value(request)?,
            results: None,
            errors: Vec::new(),
        })
    }
}

fn new_job_id() -> String {
    format!("job_{}", Uuid::new_v4().simple())
}
