//! Remote audio import API handler
//!
//! POST /api/import/youtube

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::SessionState;
use crate::services::audio_fetcher::{FETCHED_AUDIO_CONTENT_TYPE, FETCHED_AUDIO_EXT};
use crate::services::stream_file;
use crate::AppState;

/// POST /api/import/youtube request
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub url: Option<String>,
}

/// POST /api/import/youtube
///
/// Download audio from `url` into a fresh session and stream it back as an
/// attachment. The session never outlives the request.
pub async fn import_youtube(
    State(state): State<AppState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let url = request
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Missing url".into()))?;

    let mut fetched = state.fetcher.fetch(url).await?;
    fetched.cleanup.advance(SessionState::Streaming);
    let download_name = format!("audio.{}", FETCHED_AUDIO_EXT);

    stream_file(
        &fetched.audio_path,
        FETCHED_AUDIO_CONTENT_TYPE,
        &download_name,
        fetched.cleanup,
    )
    .await
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new().route("/api/import/youtube", post(import_youtube))
}
