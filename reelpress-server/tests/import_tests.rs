//! Remote audio import integration tests

mod helpers;

use axum::http::{header, StatusCode};
use helpers::*;
use serde_json::json;
use axum::body::Body;
use axum::http::Request;
use std::sync::Arc;
use std::time::Duration;

const AUDIO_BYTES: &[u8] = b"ID3\x04fake-mp3-payload";

#[tokio::test]
async fn test_import_streams_audio_and_removes_session() {
    let runner = Arc::new(FakeRunner::producing(AUDIO_BYTES));
    let app = TestApp::new(runner.clone());

    let response = app
        .send(json_request(
            "/api/import/youtube",
            json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"audio.mp3\""
    );

    let bytes = body_bytes(response).await;
    assert_eq!(bytes, AUDIO_BYTES);
    assert_eq!(app.session_count(), 0);

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let (program, args) = &calls[0];
    assert_eq!(program, "yt-dlp");
    assert_eq!(
        args.last().map(String::as_str),
        Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
    );
}

#[tokio::test]
async fn test_invalid_url_creates_no_session() {
    let runner = Arc::new(FakeRunner::producing(AUDIO_BYTES));
    let app = TestApp::new(runner.clone());

    for body in [
        json!({}),
        json!({ "url": "" }),
        json!({ "url": "not a url" }),
        json!({ "url": "file:///etc/passwd" }),
    ] {
        let response = app
            .send(json_request("/api/import/youtube", body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    assert_eq!(runner.call_count(), 0);
    assert_eq!(app.session_count(), 0);
}

#[tokio::test]
async fn test_downloader_without_output_is_consistency_error() {
    let app = TestApp::new(Arc::new(FakeRunner::silent()));

    let response = app
        .send(json_request(
            "/api/import/youtube",
            json!({ "url": "https://example.com/watch" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "CONSISTENCY_ERROR");
    assert_eq!(app.session_count(), 0);
}

#[tokio::test]
async fn test_downloader_failure_is_process_error() {
    let app = TestApp::new(Arc::new(FakeRunner::failing(1)));

    let response = app
        .send(json_request(
            "/api/import/youtube",
            json!({ "url": "https://example.com/watch" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "PROCESS_ERROR");
    assert_eq!(app.session_count(), 0);
}

#[tokio::test]
async fn test_missing_downloader_is_spawn_error() {
    let app = TestApp::new(Arc::new(FakeRunner::missing()));

    let response = app
        .send(json_request(
            "/api/import/youtube",
            json!({ "url": "https://example.com/watch" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "SPAWN_ERROR");
    assert_eq!(app.session_count(), 0);
}

#[tokio::test]
async fn test_cancelled_import_removes_session() {
    let runner = Arc::new(FakeRunner::hanging());
    let app = TestApp::new(runner.clone());

    let import = app.send(json_request(
        "/api/import/youtube",
        json!({ "url": "https://example.com/watch" }),
    ));
    let outcome = tokio::time::timeout(Duration::from_millis(200), import).await;
    assert!(outcome.is_err(), "downloader should still be running");
    assert_eq!(runner.call_count(), 1);

    assert!(
        eventually(|| app.session_count() == 0).await,
        "import session left behind after cancel"
    );
}

#[tokio::test]
async fn test_non_json_body_uses_error_envelope() {
    let runner = Arc::new(FakeRunner::silent());
    let app = TestApp::new(runner.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/import/youtube")
        .body(Body::from("url=https://example.com"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(runner.call_count(), 0);
}
