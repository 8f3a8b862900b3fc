use content_analysis_hw::{
    app_state::{build_orchestrator, connect_job_store, redis_url},
    config::AppConfig,
    routes::metrics::describe_pipeline_metrics,
    services::{
        orchestrator::JobOrchestrator,
        queue::{supervise, RedisJobQueue},
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting content analysis worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let metrics_addr = config
        .validate_worker()
        .expect("Worker needs DATABASE_URL, REDIS_URL and a valid WORKER_METRICS_ADDR");

    // Each worker serves its own scrape endpoint; the API's /metrics only
    // sees the API process.
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus exporter");
    describe_pipeline_metrics();
    tracing::info!(%metrics_addr, "Worker metrics exporter listening");

    let jobs = connect_job_store(&config)
        .await
        .expect("Failed to initialize job store");

    let orchestrator =
        Arc::new(build_orchestrator(&config, jobs).expect("Failed to initialize collaborators"));

    let queue = RedisJobQueue::new(redis_url(&config).expect("REDIS_URL is required for the worker"))
        .expect("Failed to initialize job queue");

    tracing::info!(
        media_concurrency = config.media_concurrency,
        "Worker ready, starting job processing loop"
    );

    loop {
        match process_next_job(&queue, &orchestrator).await {
            Ok(true) => {
                tracing::debug!("Job handled, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Queue error, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Take the next message and run its job to a terminal status.
/// Returns Ok(true) if a message was handled, Ok(false) if the queue was empty.
///
/// Messages are completed whatever the job outcome; failed jobs are not
/// retried.
async fn process_next_job(
    queue: &RedisJobQueue,
    orchestrator: &Arc<JobOrchestrator>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let message = match queue.dequeue().await? {
        Some(m) => m,
        None => return Ok(false),
    };

    if let Ok(depth) = queue.queue_depth().await {
        metrics::gauge!("content_analysis_queue_depth").set(depth as f64);
        tracing::debug!(job_id = %message.job_id, queue_depth = depth, "Dequeued job");
    }

    match supervise(Arc::clone(orchestrator), message.clone()).await {
        Some(status) => {
            tracing::info!(job_id = %message.job_id, status = %status, "Job reached terminal status");
        }
        None => {
            tracing::info!(job_id = %message.job_id, "Message skipped");
        }
    }

    queue.complete(&message).await?;
    Ok(true)
}
