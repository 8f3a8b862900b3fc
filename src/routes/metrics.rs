use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}

/// Register descriptions for the pipeline metrics.
pub fn describe_pipeline_metrics() {
    metrics::describe_counter!(
        "content_analysis_jobs_submitted_total",
        "Total content analysis jobs submitted"
    );
    metrics::describe_counter!(
        "content_analysis_jobs_finished_total",
        "Jobs that reached a terminal status, by status"
    );
    metrics::describe_counter!(
        "content_analysis_dispatch_failures_total",
        "Jobs that could not be handed off for processing"
    );
    metrics::describe_counter!(
        "content_analysis_media_processed_total",
        "Media items sent to the moderation scorer, by outcome"
    );
    metrics::describe_gauge!(
        "content_analysis_queue_depth",
        "Pending jobs in the Redis queue, sampled by workers"
    );
    metrics::describe_histogram!(
        "content_analysis_job_seconds",
        "Time to process a content analysis job"
    );
}
