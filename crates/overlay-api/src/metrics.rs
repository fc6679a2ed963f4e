//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "overlay_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "overlay_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "overlay_http_requests_in_flight";

    // Job metrics
    pub const JOBS_STARTED_TOTAL: &str = "overlay_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "overlay_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "overlay_jobs_failed_total";
    pub const JOBS_REJECTED_TOTAL: &str = "overlay_jobs_rejected_total";
    pub const JOBS_ADMITTED: &str = "overlay_jobs_admitted";

    // Processing metrics
    pub const COMPOSE_DURATION_SECONDS: &str = "overlay_compose_duration_seconds";
    pub const MERGE_DURATION_SECONDS: &str = "overlay_merge_duration_seconds";
    pub const UPLOAD_BYTES: &str = "overlay_upload_bytes";

    // Degradation metrics
    pub const FONT_FALLBACK_TOTAL: &str = "overlay_font_fallback_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "overlay_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a job admitted into the pipeline.
pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record a job failure at `stage` (upload, probe, compose, merge).
pub fn record_job_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record a job turned away because the queue was full.
pub fn record_job_rejected() {
    counter!(names::JOBS_REJECTED_TOTAL).increment(1);
}

/// Update the admitted (running + waiting) jobs gauge.
pub fn set_jobs_admitted(count: usize) {
    gauge!(names::JOBS_ADMITTED).set(count as f64);
}

pub fn record_compose_duration(duration_secs: f64) {
    histogram!(names::COMPOSE_DURATION_SECONDS).record(duration_secs);
}

pub fn record_merge_duration(duration_secs: f64) {
    histogram!(names::MERGE_DURATION_SECONDS).record(duration_secs);
}

pub fn record_upload_size(bytes: u64) {
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Record that overlays are rendered with a non-primary font.
pub fn record_font_fallback(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::FONT_FALLBACK_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse unknown paths so scanners cannot blow up label cardinality.
fn sanitize_path(path: &str) -> String {
    match path {
        "/" | "/health" | "/healthz" | "/metrics" | "/add-text-overlay" | "/video-info" => path.to_string(),
        _ => "/:unmatched".to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
