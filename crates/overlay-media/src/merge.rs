//! Burn a composite overlay into a video.
//!
//! The overlay PNG is fed to FFmpeg as a second input and alpha-blended at
//! the origin of every frame after the source is fitted to the canvas.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use overlay_models::{EncodingConfig, FrameSize, JobId, VideoJob};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{canvas_fit_filter, overlay_filter_complex, OUTPUT_LABEL};
use crate::probe::probe_video;

/// Default wall-clock budget for one merge.
pub const DEFAULT_MERGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Encoding and time budget for [`merge`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub encoding: EncodingConfig,
    pub timeout: Duration,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            encoding: EncodingConfig::default(),
            timeout: DEFAULT_MERGE_TIMEOUT,
        }
    }
}

/// Probe `source` and describe the job that will turn it into `output`.
pub async fn prepare_job(
    id: JobId,
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    frame: FrameSize,
) -> MediaResult<VideoJob> {
    let source = source.as_ref();
    let info = probe_video(source).await?;
    info.validate()?;

    debug!(
        job_id = %id,
        width = info.width,
        height = info.height,
        rotation = info.rotation,
        duration = info.duration,
        has_audio = info.has_audio,
        "Probed source video"
    );

    Ok(VideoJob {
        id,
        source_path: source.to_path_buf(),
        output_path: output.as_ref().to_path_buf(),
        frame,
        source_size: info.frame_size(),
        duration_seconds: info.duration,
        fps: info.fps,
        audio_present: info.has_audio,
        audio_codec: info.audio_codec,
        created_at: Utc::now(),
    })
}

/// Build the FFmpeg invocation for `job`.
pub fn build_merge_command(job: &VideoJob, overlay_png: &Path, encoding: &EncodingConfig) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(&job.source_path, &job.output_path)
        .add_input(overlay_png)
        .filter_complex(overlay_filter_complex(&canvas_fit_filter(job.frame)))
        .map(OUTPUT_LABEL)
        .map("0:a?")
        .output_args(encoding.video_args());

    if job.audio_present {
        cmd = cmd.output_args(encoding.audio_args(job.audio_codec.as_deref()));
    }

    cmd.faststart()
}

/// Merge `overlay_png` into the job's source, writing `job.output_path`.
pub async fn merge(job: &VideoJob, overlay_png: &Path, options: &MergeOptions) -> MediaResult<PathBuf> {
    if !overlay_png.exists() {
        return Err(MediaError::FileNotFound(overlay_png.to_path_buf()));
    }

    let cmd = build_merge_command(job, overlay_png, &options.encoding);

    info!(
        job_id = %job.id,
        rescale = job.needs_canvas_fit(),
        audio = job.audio_present,
        "Merging overlay into video"
    );

    let job_id = job.id.clone();
    let duration = job.duration_seconds;
    FfmpegRunner::new()
        .with_timeout(options.timeout)
        .run_with_progress(&cmd, move |progress| {
            debug!(
                job_id = %job_id,
                percent = progress.percentage((duration * 1000.0) as i64),
                speed = progress.speed,
                "Merge progress"
            );
        })
        .await?;

    if !job.output_path.exists() {
        return Err(MediaError::ffmpeg_failed("FFmpeg produced no output file", None, None));
    }

    info!(job_id = %job.id, "Overlay merge complete");
    Ok(job.output_path.clone())
}
