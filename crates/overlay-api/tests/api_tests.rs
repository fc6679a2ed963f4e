//! API integration tests.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.
//! Tests that need FFmpeg return early when it is not installed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use overlay_api::{create_router, ApiConfig, AppState, ProcessingConfig};
use overlay_media::{probe_video, FontResolver};
use overlay_models::MAX_TEXT_CHARS;

const BOUNDARY: &str = "overlay-test-boundary";

enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn test_config(work_dir: &Path) -> ApiConfig {
    ApiConfig {
        metrics_enabled: false,
        processing: ProcessingConfig {
            work_dir: work_dir.to_path_buf(),
            ..ProcessingConfig::default()
        },
        ..ApiConfig::default()
    }
}

fn router_with(config: ApiConfig) -> (Router, AppState) {
    let state = AppState::with_fonts(config, FontResolver::placeholder()).unwrap();
    (create_router(state.clone(), None), state)
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn job_dirs(work_dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(work_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("job-"))
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

const TEXTS: &str = r#"["When you finally get the joke", "POV: the meeting could have been an email", "Follow for part 2"]"#;

#[tokio::test]
async fn test_health_endpoint() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "text-overlay");
    assert!(body["timestamp"].is_string());
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["output"]["width"], 720);
    assert_eq!(body["output"]["height"], 1280);
    assert_eq!(body["limits"]["max_text_chars"], MAX_TEXT_CHARS);
    let endpoints = body["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e == "POST /add-text-overlay"));
}

#[tokio::test]
async fn test_unknown_route_returns_catalogue() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let response = app
        .oneshot(Request::builder().uri("/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "NotFoundError");
    assert!(body["available_endpoints"].as_array().is_some_and(|a| !a.is_empty()));
}

#[tokio::test]
async fn test_catalogue_lists_every_routed_path() {
    let tmp = TempDir::new().unwrap();
    let state = AppState::with_fonts(test_config(tmp.path()), FontResolver::placeholder()).unwrap();
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = create_router(state, Some(handle));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let endpoints: Vec<String> = json_body(response).await["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_str().map(str::to_string))
        .collect();

    for expected in ["GET /healthz", "GET /metrics", "POST /video-info"] {
        assert!(endpoints.iter().any(|e| e == expected), "{} missing from {:?}", expected, endpoints);
    }

    for endpoint in endpoints.iter().filter_map(|e| e.strip_prefix("GET ")) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(endpoint).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {}", endpoint);
    }
}

#[tokio::test]
async fn test_two_texts_rejected() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "clip.mp4",
            content_type: "video/mp4",
            data: b"not really a video",
        },
        Part::Text {
            name: "texts",
            value: r#"["only", "two"]"#,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "InputValidationError");
    assert!(body.get("correlation_id").is_none());
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_overlong_text_rejected() {
    let tmp = TempDir::new().unwrap();
    let (app, state) = router_with(test_config(tmp.path()));

    let texts = serde_json::json!(["top", "c".repeat(MAX_TEXT_CHARS + 1), "bottom"]).to_string();
    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "clip.mp4",
            content_type: "video/mp4",
            data: b"not really a video",
        },
        Part::Text {
            name: "texts",
            value: &texts,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "InputValidationError");
    assert!(body["detail"].as_str().unwrap().contains(&MAX_TEXT_CHARS.to_string()));
    assert!(job_dirs(tmp.path()).is_empty());
    assert_eq!(state.overlay.gate().admitted(), 0);
}

#[tokio::test]
async fn test_missing_video_rejected() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let body = multipart_body(&[Part::Text {
        name: "texts",
        value: TEXTS,
    }]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "InputValidationError");
    assert!(body["detail"].as_str().unwrap().contains("video"));
}

#[tokio::test]
async fn test_disallowed_content_type_rejected() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "notes.txt",
            content_type: "text/plain",
            data: b"hello",
        },
        Part::Text {
            name: "texts",
            value: TEXTS,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "UnsupportedFormatError");
}

#[tokio::test]
async fn test_declared_oversize_rejected_before_reading() {
    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let declared = 60 * 1024 * 1024;
    let request = Request::builder()
        .method("POST")
        .uri("/add-text-overlay")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .header(header::CONTENT_LENGTH, declared)
        .body(Body::from(multipart_body(&[])))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["error"], "ResourceLimitError");
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_streamed_oversize_rejected_and_cleaned_up() {
    let tmp = TempDir::new().unwrap();
    let config = ApiConfig {
        max_upload_bytes: 1024,
        ..test_config(tmp.path())
    };
    let (app, state) = router_with(config);

    let video = vec![0u8; 8 * 1024];
    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "big.mp4",
            content_type: "video/mp4",
            data: &video,
        },
        Part::Text {
            name: "texts",
            value: TEXTS,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["error"], "ResourceLimitError");
    assert!(job_dirs(tmp.path()).is_empty());
    assert_eq!(state.overlay.gate().admitted(), 0);
}

#[tokio::test]
async fn test_full_queue_returns_busy() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.processing.max_concurrent_jobs = 1;
    config.processing.max_queued_jobs = 0;
    let (app, state) = router_with(config);

    let _held = state.overlay.admit().unwrap();

    let body = multipart_body(&[Part::Text {
        name: "texts",
        value: TEXTS,
    }]);
    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(json_body(response).await["error"], "ServerBusyError");
}

#[tokio::test]
async fn test_video_info_shares_the_job_gate() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.processing.max_concurrent_jobs = 1;
    config.processing.max_queued_jobs = 0;
    let (app, state) = router_with(config);

    let held = state.overlay.admit().unwrap();

    let body = multipart_body(&[Part::File {
        name: "video",
        filename: "clip.mp4",
        content_type: "video/mp4",
        data: b"not really a video",
    }]);
    let response = app.oneshot(upload_request("/video-info", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "ServerBusyError");
    assert!(job_dirs(tmp.path()).is_empty());

    drop(held);
    assert_eq!(state.overlay.gate().admitted(), 0);
}

#[tokio::test]
async fn test_upload_routes_are_rate_limited_per_ip() {
    let tmp = TempDir::new().unwrap();
    let config = ApiConfig {
        rate_limit_rps: 1,
        ..test_config(tmp.path())
    };
    let (app, _) = router_with(config);

    let request = |ip: &str| {
        let body = multipart_body(&[Part::Text {
            name: "texts",
            value: TEXTS,
        }]);
        let mut request = upload_request("/add-text-overlay", body);
        request.headers_mut().insert("X-Forwarded-For", ip.parse().unwrap());
        request
    };

    let first = app.clone().oneshot(request("198.51.100.10")).await.unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = app.clone().oneshot(request("198.51.100.10")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(second).await["error"], "RateLimitError");

    let other = app.oneshot(request("198.51.100.11")).await.unwrap();
    assert_eq!(other.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// FFmpeg-backed scenarios
// ============================================================================

fn ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

/// Generate a short test clip with a tone, or `None` when the local
/// FFmpeg build cannot encode it.
async fn generate_clip(dir: &Path, size: &str, seconds: u32) -> Option<Vec<u8>> {
    encode_clip(dir, size, seconds, true).await
}

/// Like [`generate_clip`] without an audio stream.
async fn generate_silent_clip(dir: &Path, size: &str, seconds: u32) -> Option<Vec<u8>> {
    encode_clip(dir, size, seconds, false).await
}

async fn encode_clip(dir: &Path, size: &str, seconds: u32, with_audio: bool) -> Option<Vec<u8>> {
    let path = dir.join(format!("source-{}-{}.mp4", size, if with_audio { "tone" } else { "silent" }));
    let mut cmd = tokio::process::Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=size={}:rate=30", size));
    if with_audio {
        cmd.args(["-f", "lavfi", "-i", "sine=frequency=440:sample_rate=44100"]);
    }
    cmd.arg("-t")
        .arg(seconds.to_string())
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]);
    if with_audio {
        cmd.args(["-c:a", "aac", "-shortest"]);
    }

    let status = cmd.arg(&path).status().await.ok()?;
    if !status.success() {
        return None;
    }
    std::fs::read(&path).ok()
}

/// Write `bytes` next to the other test files and read their stream info.
async fn video_info_of(dir: &Path, name: &str, bytes: &[u8]) -> overlay_media::VideoInfo {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    probe_video(&path).await.unwrap()
}

fn overlay_form(video: &[u8], texts: &str) -> Vec<u8> {
    multipart_body(&[
        Part::File {
            name: "video",
            filename: "clip.mp4",
            content_type: "video/mp4",
            data: video,
        },
        Part::Text {
            name: "texts",
            value: texts,
        },
    ])
}

#[tokio::test]
async fn test_overlay_end_to_end_with_missing_font() {
    if !ffmpeg_available() {
        eprintln!("Skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let Some(video) = generate_clip(tmp.path(), "720x1280", 2).await else {
        eprintln!("Skipping: ffmpeg cannot encode test clip");
        return;
    };

    let work_dir = tmp.path().join("work");
    let mut config = test_config(&work_dir);
    config.processing.font_path = Some(tmp.path().join("missing-font.ttf"));
    let state = AppState::new(config).unwrap();
    let app = create_router(state, None);

    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "clip.mp4",
            content_type: "video/mp4",
            data: &video,
        },
        Part::Text {
            name: "texts",
            value: TEXTS,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"video-with-overlay.mp4\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!bytes.is_empty());

    let source = video_info_of(tmp.path(), "source.mp4", &video).await;
    let info = video_info_of(tmp.path(), "output.mp4", &bytes).await;
    assert_eq!((info.width, info.height), (720, 1280));
    assert!(info.has_audio);
    assert!(
        (info.duration - source.duration).abs() < 0.1,
        "output {}s, source {}s",
        info.duration,
        source.duration
    );

    assert!(job_dirs(&work_dir).is_empty());
}

#[tokio::test]
async fn test_silent_source_yields_silent_output() {
    if !ffmpeg_available() {
        eprintln!("Skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let Some(video) = generate_silent_clip(tmp.path(), "720x1280", 2).await else {
        eprintln!("Skipping: ffmpeg cannot encode test clip");
        return;
    };

    let work_dir = tmp.path().join("work");
    let (app, _) = router_with(test_config(&work_dir));

    let response = app
        .oneshot(upload_request("/add-text-overlay", overlay_form(&video, TEXTS)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let source = video_info_of(tmp.path(), "source.mp4", &video).await;
    let info = video_info_of(tmp.path(), "output.mp4", &bytes).await;

    assert!(!source.has_audio);
    assert!(!info.has_audio);
    assert!(info.audio_codec.is_none());
    assert!(
        (info.duration - source.duration).abs() < 0.1,
        "output {}s, source {}s",
        info.duration,
        source.duration
    );
    assert!(job_dirs(&work_dir).is_empty());
}

#[tokio::test]
async fn test_merge_timeout_returns_408_and_cleans_up() {
    if !ffmpeg_available() {
        eprintln!("Skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let Some(video) = generate_clip(tmp.path(), "720x1280", 2).await else {
        eprintln!("Skipping: ffmpeg cannot encode test clip");
        return;
    };

    let work_dir = tmp.path().join("work");
    let mut config = test_config(&work_dir);
    config.processing.timeout = Duration::from_millis(1);
    let (app, state) = router_with(config);

    let response = app
        .oneshot(upload_request("/add-text-overlay", overlay_form(&video, TEXTS)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let body = json_body(response).await;
    assert_eq!(body["error"], "ProcessingTimeoutError");
    assert!(job_dirs(&work_dir).is_empty());
    assert_eq!(state.overlay.gate().admitted(), 0);
}

#[tokio::test]
async fn test_landscape_source_is_cropped_to_portrait() {
    if !ffmpeg_available() {
        eprintln!("Skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let Some(video) = generate_clip(tmp.path(), "640x360", 1).await else {
        eprintln!("Skipping: ffmpeg cannot encode test clip");
        return;
    };

    let work_dir = tmp.path().join("work");
    let (app, _) = router_with(test_config(&work_dir));

    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "wide.mp4",
            content_type: "application/octet-stream",
            data: &video,
        },
        Part::Text {
            name: "texts",
            value: r#"["", "center only", ""]"#,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let output = tmp.path().join("output.mp4");
    std::fs::write(&output, &bytes).unwrap();

    let info = probe_video(&output).await.unwrap();
    assert_eq!((info.width, info.height), (720, 1280));
}

#[tokio::test]
async fn test_video_info_probes_upload() {
    if !ffmpeg_available() {
        eprintln!("Skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let Some(video) = generate_clip(tmp.path(), "360x640", 1).await else {
        eprintln!("Skipping: ffmpeg cannot encode test clip");
        return;
    };

    let work_dir = tmp.path().join("work");
    let (app, _) = router_with(test_config(&work_dir));

    let body = multipart_body(&[Part::File {
        name: "video",
        filename: "clip.mp4",
        content_type: "video/mp4",
        data: &video,
    }]);

    let response = app.oneshot(upload_request("/video-info", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["filename"], "clip.mp4");
    assert_eq!(body["width"], 360);
    assert_eq!(body["height"], 640);
    assert_eq!(body["has_audio"], true);
    assert_eq!(body["size_bytes"], video.len() as u64);
    assert!(job_dirs(&work_dir).is_empty());
}

#[tokio::test]
async fn test_garbage_upload_is_client_error() {
    if !ffmpeg_available() {
        eprintln!("Skipping: ffmpeg not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let (app, _) = router_with(test_config(tmp.path()));

    let body = multipart_body(&[
        Part::File {
            name: "video",
            filename: "clip.mp4",
            content_type: "video/mp4",
            data: b"definitely not an mp4 container",
        },
        Part::Text {
            name: "texts",
            value: TEXTS,
        },
    ]);

    let response = app.oneshot(upload_request("/add-text-overlay", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(
        error == "UnsupportedFormatError" || error == "InputValidationError",
        "unexpected error {}",
        error
    );
    assert!(job_dirs(tmp.path()).is_empty());
}
