//! Job state machine: PENDING → IN_PROGRESS → COMPLETED | COMPLETED_WITH_WARNINGS | FAILED.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::db::repository::{JobRepository, RepositoryError};
use crate::models::job::{JobResults, JobStatus};
use crate::models::moderation::MediaModerationResult;
use crate::models::request::ContentAnalysisRequest;
use crate::services::aggregation;
use crate::services::media::process_media;
use crate::services::queue::QueuedJob;
use crate::services::sightengine::ModerationScorer;
use crate::services::summary::{Summarizer, SummaryError};

/// Drives a job from IN_PROGRESS to a terminal status.
pub struct JobOrchestrator {
    jobs: Arc<dyn JobRepository>,
    scorer: Arc<dyn ModerationScorer>,
    summarizer: Arc<dyn Summarizer>,
    media_concurrency: usize,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        scorer: Arc<dyn ModerationScorer>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            jobs,
            scorer,
            summarizer,
            media_concurrency: 1,
        }
    }

    /// Analyze up to `limit` media items of one job at a time. Results keep
    /// submission order regardless.
    pub fn with_media_concurrency(mut self, limit: usize) -> Self {
        self.media_concurrency = limit.max(1);
        self
    }

    pub fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }

    /// Handle one queue message. Jobs that are unknown or already past PENDING
    /// are dropped, so a redelivered message never reruns a job.
    pub async fn consume(&self, message: &QueuedJob) -> Option<JobStatus> {
        let job = match self.jobs.get(&message.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id = %message.job_id, "Dropping message for unknown job");
                return None;
            }
            Err(e) => {
                error!(job_id = %message.job_id, error = %e, "Failed to load job");
                return None;
            }
        };

        if job.status != JobStatus::Pending {
            warn!(job_id = %job.id, status = %job.status, "Job already picked up; skipping");
            return None;
        }

        Some(self.run(&job.id, &message.payload).await)
    }

    /// Process a job to a terminal status. Never fails: job-level errors are
    /// recorded on the job as FAILED.
    pub async fn run(&self, job_id: &str, payload: &serde_json::Value) -> JobStatus {
        let start = Instant::now();
        info!(job_id = %job_id, "Processing content analysis job");

        let status = match self.process(job_id, payload).await {
            Ok(status) => {
                info!(
                    job_id = %job_id,
                    status = %status,
                    duration_ms = start.elapsed().as_millis(),
                    "Job finished"
                );
                status
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job processing failed");
                if let Err(update_err) = self
                    .jobs
                    .update_status(job_id, JobStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    error!(job_id = %job_id, error = %update_err, "Failed to record job failure");
                }
                JobStatus::Failed
            }
        };

        self.release_collaborators().await;

        metrics::counter!("content_analysis_jobs_finished_total", "status" => status.to_string())
            .increment(1);
        metrics::histogram!("content_analysis_job_seconds").record(start.elapsed().as_secs_f64());

        status
    }

    /// Release per-run collaborator resources. Called once per run, including
    /// runs that end in a panic.
    pub async fn release_collaborators(&self) {
        self.scorer.release().await;
        self.summarizer.release().await;
    }

    async fn process(&self, job_id: &str, payload: &serde_json::Value) -> Result<JobStatus, PipelineError> {
        self.jobs.update_status(job_id, JobStatus::InProgress, None).await?;

        let request: ContentAnalysisRequest =
            serde_json::from_value(payload.clone()).map_err(PipelineError::Payload)?;

        let media = self.analyze_media(&request).await;
        let failed_items = media.iter().filter(|m| !m.errors.is_empty()).count();
        debug!(
            job_id = %job_id,
            media_count = media.len(),
            items_with_errors = failed_items,
            "Media analysis complete"
        );

        let visual = aggregation::aggregate(&media);
        let status = aggregation::terminal_status(&visual);
        debug!(
            job_id = %job_id,
            overall_visual_score = ?visual.overall_visual_score,
            status = %status,
            "Aggregation complete"
        );

        let summary = self.summarizer.summarize(&visual).await?;

        let results = JobResults {
            visual,
            media,
            summary,
        };
        self.jobs.update_results(job_id, &results, status, Utc::now()).await?;

        Ok(status)
    }

    async fn analyze_media(&self, request: &ContentAnalysisRequest) -> Vec<MediaModerationResult> {
        let scorer = self.scorer.as_ref();
        let pending: Vec<_> = request
            .image_items()
            .map(|media| process_media(scorer, media))
            .collect();
        stream::iter(pending)
            .buffered(self.media_concurrency)
            .collect()
            .await
    }
}

/// Job-scoped fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("job store error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("malformed job payload: {0}")]
    Payload(serde_json::Error),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::InMemoryJobRepository;
    use crate::models::job::AnalysisJob;
    use crate::models::moderation::{Category, SafetyStatus, VisualSafetyReport};
    use crate::models::request::{MediaItem, MediaKind, PostItem};
    use crate::services::sightengine::ScorerError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scorer keyed by URL; unknown URLs fail.
    #[derive(Default)]
    struct UrlScorer {
        payloads: HashMap<String, Value>,
        delays: HashMap<String, u64>,
        released: AtomicUsize,
    }

    impl UrlScorer {
        fn with(mut self, url: &str, payload: Value) -> Self {
            self.payloads.insert(url.to_string(), payload);
            self
        }

        fn delayed(mut self, url: &str, millis: u64) -> Self {
            self.delays.insert(url.to_string(), millis);
            self
        }
    }

    #[async_trait]
    impl ModerationScorer for UrlScorer {
        async fn analyze_image(&self, image_url: &str) -> Result<Value, ScorerError> {
            if let Some(ms) = self.delays.get(image_url) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.payloads
                .get(image_url)
                .cloned()
                .ok_or(ScorerError::Status(404))
        }

        async fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSummarizer {
        fail: bool,
        seen: Mutex<Vec<VisualSafetyReport>>,
        released: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(&self, report: &VisualSafetyReport) -> Result<String, SummaryError> {
            self.seen.lock().unwrap().push(report.clone());
            if self.fail {
                return Err(SummaryError::Status(503));
            }
            Ok("summary text".to_string())
        }

        async fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn uniform(risk: f64) -> Value {
        json!({
            "status": "success",
            "nudity": {"sexual_activity": risk},
            "violence": {"violence": risk},
            "weapon": {"firearm": risk},
            "medical": {"gore": risk},
            "spoof": {"fake": risk},
        })
    }

    fn item(id: &str, kind: MediaKind) -> MediaItem {
        MediaItem {
            media_id: id.to_string(),
            kind,
            url: format!("https://cdn.example.com/{id}"),
        }
    }

    fn request(media: Vec<MediaItem>) -> ContentAnalysisRequest {
        ContentAnalysisRequest {
            campaign_id: "cmp_456".to_string(),
            creator_id: "creator".to_string(),
            posts: vec![PostItem {
                post_id: "post_1".to_string(),
                media,
            }],
        }
    }

    async fn seeded(repo: &InMemoryJobRepository, request: &ContentAnalysisRequest) -> AnalysisJob {
        let job = AnalysisJob::pending(request).unwrap();
        repo.create(&job).await.unwrap();
        job
    }

    fn orchestrator(
        repo: &Arc<InMemoryJobRepository>,
        scorer: &Arc<UrlScorer>,
        summarizer: &Arc<RecordingSummarizer>,
    ) -> JobOrchestrator {
        JobOrchestrator::new(repo.clone(), scorer.clone(), summarizer.clone())
    }

    #[tokio::test]
    async fn test_safe_content_completes() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default().with("https://cdn.example.com/m1", uniform(0.01)));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(&repo, &request(vec![item("m1", MediaKind::Image)])).await;

        let status = orchestrator(&repo, &scorer, &summarizer).run(&job.id, &job.payload).await;

        assert_eq!(status, JobStatus::Completed);
        let stored = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.errors.is_empty());
        let results = stored.results.unwrap();
        assert_eq!(results.summary, "summary text");
        assert_eq!(results.media.len(), 1);
        assert_eq!(results.visual.overall_visual_score, Some(99.0));
    }

    #[tokio::test]
    async fn test_warning_category_completes_with_warnings() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default().with("https://cdn.example.com/m1", uniform(0.2)));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(&repo, &request(vec![item("m1", MediaKind::Image)])).await;

        let status = orchestrator(&repo, &scorer, &summarizer).run(&job.id, &job.payload).await;

        assert_eq!(status, JobStatus::CompletedWithWarnings);
    }

    #[tokio::test]
    async fn test_scorer_failure_for_one_item_keeps_the_other() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default().with("https://cdn.example.com/b", uniform(0.0)));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(
            &repo,
            &request(vec![item("a", MediaKind::Image), item("b", MediaKind::Image)]),
        )
        .await;

        let status = orchestrator(&repo, &scorer, &summarizer).run(&job.id, &job.payload).await;

        assert_eq!(status, JobStatus::Completed);
        let results = repo.get(&job.id).await.unwrap().unwrap().results.unwrap();
        let a = &results.media[0];
        let b = &results.media[1];
        assert_eq!(a.media_id, "a");
        assert_eq!(a.errors.len(), 1);
        assert!(a.categories.is_empty());
        assert_eq!(b.media_id, "b");
        assert!(b.errors.is_empty());
        assert_eq!(b.categories.len(), 5);
        assert!(b.categories.values().all(|c| c.score() == Some(100.0)));
    }

    #[tokio::test]
    async fn test_unsafe_fails_but_still_summarizes() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let mut risky = uniform(0.05);
        risky["spoof"] = json!({"fake": 0.75});
        let scorer = Arc::new(
            UrlScorer::default()
                .with("https://cdn.example.com/m1", uniform(0.05))
                .with("https://cdn.example.com/m2", risky),
        );
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(
            &repo,
            &request(vec![item("m1", MediaKind::Image), item("m2", MediaKind::Image)]),
        )
        .await;

        let status = orchestrator(&repo, &scorer, &summarizer).run(&job.id, &job.payload).await;

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(summarizer.seen.lock().unwrap().len(), 1);
        let stored = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.errors.is_empty());
        let results = stored.results.unwrap();
        assert_eq!(results.media.len(), 2);
        let spoof = &results.visual.categories[&Category::SpoofFake];
        assert_eq!(spoof.score(), Some(60.0));
        assert_eq!(spoof.status(), Some(SafetyStatus::Unsafe));
        assert!(spoof.explanation().is_some());
    }

    #[tokio::test]
    async fn test_videos_are_skipped_silently() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default().with("https://cdn.example.com/img", uniform(0.0)));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(
            &repo,
            &request(vec![item("vid", MediaKind::Video), item("img", MediaKind::Image)]),
        )
        .await;

        orchestrator(&repo, &scorer, &summarizer).run(&job.id, &job.payload).await;

        let stored = repo.get(&job.id).await.unwrap().unwrap();
        let media = stored.results.unwrap().media;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].media_id, "img");
        assert!(stored.errors.is_empty());
    }

    #[tokio::test]
    async fn test_summarizer_failure_fails_job_without_results() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default().with("https://cdn.example.com/m1", uniform(0.0)));
        let summarizer = Arc::new(RecordingSummarizer {
            fail: true,
            ..Default::default()
        });
        let job = seeded(&repo, &request(vec![item("m1", MediaKind::Image)])).await;

        let status = orchestrator(&repo, &scorer, &summarizer).run(&job.id, &job.payload).await;

        assert_eq!(status, JobStatus::Failed);
        let stored = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.results.is_none());
        assert_eq!(stored.errors.len(), 1);
        assert_eq!(stored.errors[0], "summary service returned HTTP 503");
        assert_eq!(scorer.released.load(Ordering::SeqCst), 1);
        assert_eq!(summarizer.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_before_summary() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default());
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(&repo, &request(vec![item("m1", MediaKind::Image)])).await;

        let status = orchestrator(&repo, &scorer, &summarizer)
            .run(&job.id, &json!({"posts": "not a list"}))
            .await;

        assert_eq!(status, JobStatus::Failed);
        assert!(summarizer.seen.lock().unwrap().is_empty());
        let stored = repo.get(&job.id).await.unwrap().unwrap();
        assert!(stored.errors[0].starts_with("malformed job payload"));
        assert_eq!(scorer.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_consume_skips_jobs_already_picked_up() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(UrlScorer::default().with("https://cdn.example.com/m1", uniform(0.0)));
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(&repo, &request(vec![item("m1", MediaKind::Image)])).await;
        let orchestrator = orchestrator(&repo, &scorer, &summarizer);
        let message = QueuedJob {
            job_id: job.id.clone(),
            payload: job.payload.clone(),
        };

        assert_eq!(orchestrator.consume(&message).await, Some(JobStatus::Completed));
        assert_eq!(orchestrator.consume(&message).await, None);
        assert_eq!(summarizer.seen.lock().unwrap().len(), 1);

        let unknown = QueuedJob {
            job_id: "job_unknown".to_string(),
            payload: json!({}),
        };
        assert_eq!(orchestrator.consume(&unknown).await, None);
    }

    #[tokio::test]
    async fn test_concurrent_media_keeps_submission_order() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let scorer = Arc::new(
            UrlScorer::default()
                .with("https://cdn.example.com/slow", uniform(0.0))
                .with("https://cdn.example.com/fast", uniform(0.5))
                .delayed("https://cdn.example.com/slow", 50),
        );
        let summarizer = Arc::new(RecordingSummarizer::default());
        let job = seeded(
            &repo,
            &request(vec![item("slow", MediaKind::Image), item("fast", MediaKind::Image)]),
        )
        .await;

        let orchestrator = orchestrator(&repo, &scorer, &summarizer).with_media_concurrency(4);
        orchestrator.run(&job.id, &job.payload).await;

        let media = repo.get(&job.id).await.unwrap().unwrap().results.unwrap().media;
        let ids: Vec<_> = media.iter().map(|m| m.media_id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
    }
}
