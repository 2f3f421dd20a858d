use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use chunkdrop::config::Config;
use chunkdrop::handlers::{cancel_upload, health_check, pause_upload, upload_status};
use chunkdrop::server::build_router;
use chunkdrop::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const BOUNDARY: &str = "chunkdrop-test-boundary";

fn test_config(uploads_dir: std::path::PathBuf, max_upload_size: usize) -> Config {
    Config {
        uploads_dir,
        host: "127.0.0.1".to_string(),
        port: 0,
        chunk_size: 100,
        max_upload_size,
        worker_threads: 2,
    }
}

fn test_state(uploads_dir: &std::path::Path, chunk_size: usize) -> Arc<AppState> {
    Arc::new(AppState::new(uploads_dir.to_path_buf(), chunk_size))
}

fn multipart_body(filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let body = multipart_body(filename, data);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = health_check().await;
    assert_eq!(response.0["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_session_returns_not_found() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 100);

    let result = upload_status(State(state.clone()), Path("missing".to_string())).await;
    assert_eq!(result.err().unwrap().0, StatusCode::NOT_FOUND);

    let result = pause_upload(State(state.clone()), Path("missing".to_string())).await;
    assert_eq!(result.err().unwrap().0, StatusCode::NOT_FOUND);

    let result = cancel_upload(State(state), Path("missing".to_string())).await;
    assert_eq!(result.err().unwrap().0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_roundtrip_via_router() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 100);
    let config = test_config(temp_dir.path().to_path_buf(), 1024 * 1024);
    let app = build_router(state.clone(), &config);

    let data: Vec<u8> = (0..250u32).map(|i| (i % 256) as u8).collect();
    let response = app
        .clone()
        .oneshot(multipart_request("/upload", "roundtrip.bin", &data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["file_name"], "roundtrip.bin");
    assert_eq!(body["total_chunks"], 3);

    // poll status until the background worker finishes
    let mut completed = false;
    for _ in 0..500 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/upload/{session_id}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = json_body(response).await;
        if status["completed"] == true {
            assert_eq!(status["uploaded_chunks"], 3);
            assert_eq!(status["paused"], false);
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(completed, "upload never completed");

    let session = state.engine.registry().get(&session_id).unwrap();
    let written = std::fs::read(&session.destination).unwrap();
    assert_eq!(written, data);
}

// large uploads must pass through; axum's implicit 2MB body cap on the
// multipart extractor has to be lifted to the configured limit
#[tokio::test]
async fn test_upload_larger_than_two_megabytes_is_accepted() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 64 * 1024);
    let config = test_config(temp_dir.path().to_path_buf(), 16 * 1024 * 1024);
    let app = build_router(state.clone(), &config);

    let data: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 256) as u8).collect();
    let response = app
        .oneshot(multipart_request("/upload", "big.bin", &data))
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "large upload must not hit a body limit below the configured maximum"
    );

    let body = json_body(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["total_chunks"], 48);

    let mut completed = false;
    for _ in 0..500 {
        if state.engine.status(&session_id).unwrap().completed {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(4)).await;
    }
    assert!(completed, "large upload never completed");

    let session = state.engine.registry().get(&session_id).unwrap();
    let written = std::fs::read(&session.destination).unwrap();
    assert_eq!(written, data);
}

#[tokio::test]
async fn test_upload_exceeding_configured_limit_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 100);
    let config = test_config(temp_dir.path().to_path_buf(), 1024);
    let app = build_router(state, &config);

    let data = vec![5u8; 4096];
    let response = app
        .oneshot(multipart_request("/upload", "toolarge.bin", &data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_resume_on_completed_upload_conflicts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 100);
    let config = test_config(temp_dir.path().to_path_buf(), 1024 * 1024);
    let app = build_router(state.clone(), &config);

    let data = vec![7u8; 250];
    let response = app
        .clone()
        .oneshot(multipart_request("/upload", "finished.bin", &data))
        .await
        .unwrap();
    let session_id = json_body(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut finished = false;
    for _ in 0..500 {
        if state.engine.status(&session_id).unwrap().completed {
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(finished, "upload never completed");

    let response = app
        .oneshot(multipart_request(
            &format!("/upload/{session_id}/resume"),
            "finished.bin",
            &data,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 100);
    let config = test_config(temp_dir.path().to_path_buf(), 1024 * 1024);
    let app = build_router(state, &config);

    // a form field without a filename is not a file upload
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n")
            .as_bytes(),
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_uploaded_filename_is_sanitized() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(temp_dir.path(), 100);
    let config = test_config(temp_dir.path().to_path_buf(), 1024 * 1024);
    let app = build_router(state, &config);

    let response = app
        .oneshot(multipart_request("/upload", "../escape.bin", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["file_name"], "escape.bin");
}
