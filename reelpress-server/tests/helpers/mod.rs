//! Test Helper Utilities
//!
//! Shared utilities for testing reelpress-server

#![allow(dead_code)]

pub mod fake_runner;
pub mod multipart;

pub use fake_runner::{FakeBehavior, FakeRunner};
pub use multipart::MultipartBuilder;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use reelpress_server::services::ProcessRunner;
use reelpress_server::{build_router, AppState, ServerConfig};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

/// Router plus the state it was built from
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub temp: TempDir,
}

impl TestApp {
    /// App rooted in a fresh temp dir, using `runner` for all subprocesses
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_config(runner, |_| {})
    }

    /// Same as [`TestApp::new`] with config tweaks applied before building
    pub fn with_config(
        runner: Arc<dyn ProcessRunner>,
        tweak: impl FnOnce(&mut ServerConfig),
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = ServerConfig::with_temp_root(temp.path().join("sessions"));
        tweak(&mut config);
        let state = AppState::with_runner(config, runner);
        let router = build_router(state.clone());
        Self {
            router,
            state,
            temp,
        }
    }

    /// Send one request through a clone of the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Session directory path for `id`
    pub fn session_dir(&self, id: &str) -> std::path::PathBuf {
        self.state.config.temp_root.join(id)
    }

    /// Number of session directories under the temp root
    pub fn session_count(&self) -> usize {
        std::fs::read_dir(&self.state.config.temp_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Poll until `check` holds, for cleanup that runs on a spawned task
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    check()
}

/// Test helper: multipart POST request
pub fn multipart_request(uri: &str, form: MultipartBuilder) -> Request<Body> {
    let (content_type, body) = form.build();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: JSON POST request
pub fn json_request(uri: &str, json: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Test helper: read whole body
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Should read body")
        .to_bytes()
        .to_vec()
}

/// Test helper: read body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Form with `count` frames starting at index `first`
pub fn frames_form(first: u32, count: u32) -> MultipartBuilder {
    (first..first + count).fold(MultipartBuilder::new(), |form, i| {
        form.file(
            "frames",
            &format!("frame{:06}.jpg", i),
            format!("jpeg-{}", i).as_bytes(),
        )
    })
}
