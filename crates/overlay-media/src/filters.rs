//! FFmpeg filter graph definitions for the overlay merge.

use overlay_models::FrameSize;

/// Label of the final video stream in the merge graph.
pub const OUTPUT_LABEL: &str = "[vout]";

/// Scale to cover the target canvas, then center-crop the overflow.
///
/// Applied to every source, native 720x1280 included: rotated phone clips
/// and non-square sample aspect ratios report a coded size that differs
/// from what the decoder emits after autorotation.
pub fn canvas_fit_filter(target: FrameSize) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = target.width,
        h = target.height
    )
}

/// Build the `-filter_complex` graph: canvas fit of input 0, then the
/// full-frame overlay PNG (input 1) alpha-blended at the origin.
pub fn overlay_filter_complex(fit: &str) -> String {
    format!(
        "[0:v]{fit}[base];[base][1:v]overlay=0:0:format=auto{out}",
        fit = fit,
        out = OUTPUT_LABEL
    )
}
