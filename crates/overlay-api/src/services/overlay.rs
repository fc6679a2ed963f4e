//! Overlay job orchestration: probe, compose, then a gated merge.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};

use overlay_media::{
    merge, prepare_job, probe_video, JobWorkspace, MediaError, MergeOptions, OverlayBuilder, VideoInfo,
};
use overlay_models::{FrameSize, JobId, OverlayTexts};

use crate::config::ProcessingConfig;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::admission::{Admission, JobGate};

/// A video streamed to disk inside its job workspace.
#[derive(Debug)]
pub struct UploadedVideo {
    pub workspace: JobWorkspace,
    pub source_path: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
}

/// Encoded result. The workspace must outlive the response body.
#[derive(Debug)]
pub struct RenderedVideo {
    pub workspace: JobWorkspace,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Runs overlay jobs.
#[derive(Debug)]
pub struct OverlayService {
    builder: Arc<OverlayBuilder>,
    merge_options: MergeOptions,
    work_dir: PathBuf,
    gate: JobGate,
}

impl OverlayService {
    pub fn new(config: &ProcessingConfig, builder: OverlayBuilder) -> Self {
        Self {
            builder: Arc::new(builder),
            merge_options: MergeOptions {
                encoding: config.encoding.clone(),
                timeout: config.timeout,
            },
            work_dir: config.work_dir.clone(),
            gate: JobGate::new(config.max_concurrent_jobs, config.max_queued_jobs),
        }
    }

    pub fn frame(&self) -> FrameSize {
        self.builder.frame()
    }

    pub fn gate(&self) -> &JobGate {
        &self.gate
    }

    /// Reserve a place for a new job or fail with `ServerBusy`.
    pub fn admit(&self) -> ApiResult<Admission> {
        self.gate.try_admit().ok_or_else(|| {
            warn!(capacity = self.gate.capacity(), "Job queue full, rejecting request");
            metrics::record_job_rejected();
            ApiError::ServerBusy
        })
    }

    pub fn create_workspace(&self, job_id: &JobId) -> ApiResult<JobWorkspace> {
        JobWorkspace::create(&self.work_dir, job_id).map_err(|e| ApiError::from_media("workspace", e))
    }

    /// Probe an uploaded file without processing it.
    pub async fn probe(&self, upload: &UploadedVideo) -> ApiResult<VideoInfo> {
        let info = probe_video(&upload.source_path)
            .await
            .map_err(|e| ApiError::from_media("probe", e))?;
        info.validate().map_err(|e| ApiError::from_media("probe", e))?;
        Ok(info)
    }

    /// Burn `texts` into the uploaded video.
    pub async fn process(
        &self,
        admission: Admission,
        upload: UploadedVideo,
        texts: OverlayTexts,
    ) -> ApiResult<RenderedVideo> {
        let job_id = upload.workspace.job_id().clone();
        let span = info_span!("overlay_job", job_id = %job_id);

        async move {
            metrics::record_job_started();
            let started = Instant::now();

            let result = self.run(admission, upload, texts).await;
            if result.is_ok() {
                metrics::record_job_completed();
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "Overlay job finished");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, admission: Admission, upload: UploadedVideo, texts: OverlayTexts) -> ApiResult<RenderedVideo> {
        let UploadedVideo {
            workspace,
            source_path,
            filename,
            size_bytes,
        } = upload;

        info!(filename = %filename, size_bytes, "Processing upload");

        let job = prepare_job(
            workspace.job_id().clone(),
            &source_path,
            workspace.output_path(),
            self.builder.frame(),
        )
        .await
        .map_err(|e| failed("probe", e))?;

        // Compose off the async runtime, outside the merge semaphore
        let builder = Arc::clone(&self.builder);
        let overlay_path = workspace.overlay_path();
        let compose_started = Instant::now();
        tokio::task::spawn_blocking({
            let overlay_path = overlay_path.clone();
            move || builder.build(&texts)?.write_png(&overlay_path)
        })
        .await
        .map_err(|e| {
            metrics::record_job_failed("compose");
            ApiError::internal("compose", format!("compose task failed: {}", e))
        })?
        .map_err(|e| failed("compose", e))?;
        metrics::record_compose_duration(compose_started.elapsed().as_secs_f64());

        let permit = admission.acquire().await.map_err(|e| {
            metrics::record_job_failed("merge");
            ApiError::internal("merge", format!("merge slots closed: {}", e))
        })?;

        let merge_started = Instant::now();
        let output = merge(&job, &overlay_path, &self.merge_options)
            .await
            .map_err(|e| failed("merge", e))?;
        drop(permit);
        metrics::record_merge_duration(merge_started.elapsed().as_secs_f64());

        let size_bytes = tokio::fs::metadata(&output)
            .await
            .map_err(|e| {
                metrics::record_job_failed("merge");
                ApiError::internal("merge", format!("output unreadable: {}", e))
            })?
            .len();

        Ok(RenderedVideo {
            workspace,
            path: output,
            size_bytes,
        })
    }
}

fn failed(stage: &'static str, err: MediaError) -> ApiError {
    if err.is_input_error() {
        info!(stage, "Rejected upload: {}", err);
    }
    metrics::record_job_failed(stage);
    ApiError::from_media(stage, err)
}
