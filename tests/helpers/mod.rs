//! Test doubles and wiring helpers for the integration tests

use async_trait::async_trait;
use content_analysis_hw::{
    app_state::AppState,
    db::repository::{InMemoryJobRepository, JobRepository},
    models::{job::AnalysisJob, moderation::VisualSafetyReport},
    services::{
        orchestrator::JobOrchestrator,
        queue::{InProcessDispatcher, JobDispatcher, QueueError, QueuedJob},
        sightengine::{ModerationScorer, ScorerError},
        summary::{Summarizer, SummaryError},
    },
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

pub const SUMMARY_TEXT: &str = "Content reviewed. See category results for details.";

/// How the scripted scorer responds to one URL.
#[derive(Clone)]
pub enum Reply {
    Payload(Value),
    Fail(String),
    Panic,
}

/// Scorer answering from a URL → reply script; unknown URLs fail.
#[derive(Default)]
pub struct ScriptedScorer {
    replies: Mutex<HashMap<String, Reply>>,
    pub calls: AtomicUsize,
}

impl ScriptedScorer {
    pub fn reply(self, url: impl Into<String>, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(url.into(), reply);
        self
    }
}

#[async_trait]
impl ModerationScorer for ScriptedScorer {
    async fn analyze_image(&self, image_url: &str) -> Result<Value, ScorerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().get(image_url).cloned();
        match reply {
            Some(Reply::Payload(payload)) => Ok(payload),
            Some(Reply::Fail(message)) => Err(ScorerError::Api(message)),
            Some(Reply::Panic) => panic!("scorer exploded on {image_url}"),
            None => Err(ScorerError::Status(404)),
        }
    }
}

/// Summarizer returning fixed text, or failing when `fail` is set.
#[derive(Default)]
pub struct StaticSummarizer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for StaticSummarizer {
    async fn summarize(&self, _report: &VisualSafetyReport) -> Result<String, SummaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SummaryError::Status(503));
        }
        Ok(SUMMARY_TEXT.to_string())
    }
}

/// Dispatcher whose broker is always down.
pub struct DownDispatcher;

#[async_trait]
impl JobDispatcher for DownDispatcher {
    async fn publish(&self, _job: &QueuedJob) -> Result<(), QueueError> {
        Err(QueueError::Closed)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Err(QueueError::Closed)
    }
}

/// In-memory store plus in-process dispatcher running a real orchestrator.
pub struct Pipeline {
    pub jobs: Arc<InMemoryJobRepository>,
    pub state: AppState,
}

pub fn local_pipeline(scorer: ScriptedScorer, summarizer: StaticSummarizer) -> Pipeline {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let orchestrator = Arc::new(JobOrchestrator::new(
        jobs.clone(),
        Arc::new(scorer),
        Arc::new(summarizer),
    ));
    let (dispatcher, _consumer) = InProcessDispatcher::spawn(orchestrator, 16);
    let state = AppState::new(jobs.clone(), Arc::new(dispatcher));
    Pipeline { jobs, state }
}

/// Poll the store until the job reaches a terminal status (5 second limit).
pub async fn wait_for_terminal(jobs: &dyn JobRepository, job_id: &str) -> AnalysisJob {
    for _ in 0..500 {
        let job = jobs
            .get(job_id)
            .await
            .expect("job store error")
            .expect("job not found");
        if job.status.is_terminal() {
            return job;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal status");
}
