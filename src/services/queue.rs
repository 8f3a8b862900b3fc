use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::job::JobStatus;
use crate::services::orchestrator::JobOrchestrator;

const QUEUE_KEY: &str = "content_analysis:jobs";
const PROCESSING_KEY: &str = "content_analysis:processing";

/// Longest a submitter waits for room in the in-process channel.
pub const HANDOFF_TIMEOUT: Duration = Duration::from_millis(250);

/// Job message handed from the submission path to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: String,
    pub payload: serde_json::Value,
}

/// Hands jobs off for background execution.
///
/// Delivery is best effort and at most once; a successful publish means the
/// job was handed off, not that it ran.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn publish(&self, job: &QueuedJob) -> Result<(), QueueError>;

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Redis-backed job queue shared by the API server and worker processes.
pub struct RedisJobQueue {
    client: redis::Client,
}

impl RedisJobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Push a job onto the pending list.
    pub async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Pop the oldest job, moving it to the processing list.
    pub async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let result: Option<String> = conn
            .rpoplpush(QUEUE_KEY, PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let job: QueuedJob = serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Get the current queue depth (pending jobs).
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    /// Drop a handled job from the processing list.
    pub async fn complete(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[async_trait]
impl JobDispatcher for RedisJobQueue {
    async fn publish(&self, job: &QueuedJob) -> Result<(), QueueError> {
        self.enqueue(job).await
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

/// Runs jobs inside the current process on supervised tokio tasks.
#[derive(Clone)]
pub struct InProcessDispatcher {
    tx: mpsc::Sender<QueuedJob>,
}

impl InProcessDispatcher {
    /// Start the consumer loop. It exits once every dispatcher clone is dropped.
    pub fn spawn(orchestrator: Arc<JobOrchestrator>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<QueuedJob>(capacity.max(1));

        let consumer = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                tokio::spawn(supervise(Arc::clone(&orchestrator), job));
            }
            info!("In-process job consumer stopped");
        });

        (Self { tx }, consumer)
    }
}

#[async_trait]
impl JobDispatcher for InProcessDispatcher {
    async fn publish(&self, job: &QueuedJob) -> Result<(), QueueError> {
        self.tx
            .send_timeout(job.clone(), HANDOFF_TIMEOUT)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => QueueError::HandoffTimeout,
                mpsc::error::SendTimeoutError::Closed(_) => QueueError::Closed,
            })
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        if self.tx.is_closed() {
            return Err(QueueError::Closed);
        }
        Ok(())
    }
}

/// Run one job on its own task and record a panic as a job failure, so a
/// faulty job never takes its consumer down with it.
pub async fn supervise(orchestrator: Arc<JobOrchestrator>, job: QueuedJob) -> Option<JobStatus> {
    let job_id = job.job_id.clone();
    let runner = Arc::clone(&orchestrator);
    let handle = tokio::spawn(async move { runner.consume(&job).await });

    let join_error = match handle.await {
        Ok(outcome) => return outcome,
        Err(e) => e,
    };

    let cause = if join_error.is_panic() {
        format!("worker panicked: {}", panic_message(join_error.into_panic()))
    } else {
        "worker task cancelled".to_string()
    };

    error!(job_id = %job_id, cause = %cause, "Job task aborted");
    orchestrator.release_collaborators().await;
    metrics::counter!("content_analysis_jobs_finished_total", "status" => "FAILED").increment(1);

    if let Err(e) = orchestrator
        .jobs()
        .update_status(&job_id, JobStatus::Failed, Some(&cause))
        .await
    {
        warn!(job_id = %job_id, error = %e, "Failed to record aborted job");
    }
    Some(JobStatus::Failed)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Job queue is full; handoff timed out")]
    HandoffTimeout,

    #[error("Job queue is closed")]
    Closed,
}
