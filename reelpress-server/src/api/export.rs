//! Export workflow API handlers
//!
//! POST /api/export/init, POST /api/export/chunk, POST /api/export/finalize

use axum::{
    extract::{rejection::JsonRejection, Multipart, Query, State},
    http::HeaderMap,
    response::Response,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::session_id::{
    resolve_session_id, SessionQuery, SESSION_ID_HEADER, SESSION_ID_QUERY,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{SessionId, SessionState};
use crate::services::renderer::{validate_fps, DEFAULT_FPS, OUTPUT_FILE_NAME};
use crate::services::{stream_file, SessionCleanup};
use crate::AppState;

/// Content type of the rendered artifact
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// POST /api/export/init response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub success: bool,
    pub session_id: SessionId,
}

/// POST /api/export/chunk response
#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub success: bool,
    /// Files stored by this request
    pub count: usize,
    /// Files skipped by this request (oversized or unnamed)
    pub rejected: usize,
}

/// POST /api/export/finalize request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub session_id: Option<String>,
    pub fps: Option<u32>,
}

/// POST /api/export/init
///
/// Create (or reuse) a session and stage its audio track.
pub async fn init_export(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<InitResponse>> {
    let id = resolve_session_id(&query, &headers).unwrap_or_else(SessionId::generate);
    let mut session = state.sessions.ensure(&id).await?;

    match state.ingestor.receive(&mut session, &mut multipart).await {
        Ok(outcome) => {
            info!(
                session_id = %session.id,
                accepted = outcome.accepted,
                "Export session initialized"
            );
            Ok(Json(InitResponse {
                success: true,
                session_id: session.id,
            }))
        }
        Err(e) => {
            SessionCleanup::new(state.sessions.clone(), session).run().await;
            Err(e)
        }
    }
}

/// POST /api/export/chunk
///
/// Stage a batch of frames into an existing or lazily created session.
pub async fn upload_chunk(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<ChunkResponse>> {
    let id = resolve_session_id(&query, &headers).ok_or_else(|| {
        ApiError::Validation(format!(
            "Missing session id (query {} or header {})",
            SESSION_ID_QUERY, SESSION_ID_HEADER
        ))
    })?;
    let mut session = state.sessions.ensure(&id).await?;

    match state.ingestor.receive(&mut session, &mut multipart).await {
        Ok(outcome) => Ok(Json(ChunkResponse {
            success: true,
            count: outcome.accepted,
            rejected: outcome.rejected,
        })),
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "Chunk upload failed");
            SessionCleanup::new(state.sessions.clone(), session).run().await;
            Err(e)
        }
    }
}

/// POST /api/export/finalize
///
/// Render the session to MP4 and stream it back. The session is destroyed
/// once the stream ends, or immediately if rendering fails or the request
/// is cancelled.
pub async fn finalize_export(
    State(state): State<AppState>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let raw_id = request
        .session_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Missing sessionId".into()))?;
    let id = SessionId::sanitized(raw_id)
        .ok_or_else(|| ApiError::Validation(format!("Invalid sessionId: {:?}", raw_id)))?;
    let fps = validate_fps(request.fps.unwrap_or(DEFAULT_FPS))?;

    let session = state
        .sessions
        .open(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;
    let mut cleanup = SessionCleanup::new(state.sessions.clone(), session);
    cleanup.advance(SessionState::Finalizing);

    match state.renderer.render(cleanup.session(), fps).await {
        Ok(output) => {
            cleanup.advance(SessionState::Streaming);
            stream_file(&output, VIDEO_CONTENT_TYPE, OUTPUT_FILE_NAME, cleanup).await
        }
        Err(e) => {
            warn!(session_id = %id, error = %e, "Render failed");
            cleanup.run().await;
            Err(e)
        }
    }
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/init", post(init_export))
        .route("/api/export/chunk", post(upload_chunk))
        .route("/api/export/finalize", post(finalize_export))
}
