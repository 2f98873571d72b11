//! Artifact streaming with guaranteed session cleanup
//!
//! The file is piped through a `ReaderStream`, so the client's read rate
//! drives disk reads and the artifact is never buffered whole. Cleanup is
//! owned by a [`SessionCleanup`] guard that moves into the body stream and
//! fires exactly once: at end of stream, on the first read error, or from
//! `Drop` when the client disconnects and the body is discarded.

use axum::{
    body::{Body, Bytes},
    http::header,
    response::Response,
};
use futures::StreamExt;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{Session, SessionState};
use crate::services::SessionStore;

/// Destroys a session exactly once
///
/// Created as soon as a session directory exists and held across every
/// await that follows, so a cancelled request still removes the directory.
pub struct SessionCleanup {
    store: SessionStore,
    session: Session,
    armed: bool,
}

impl SessionCleanup {
    pub fn new(store: SessionStore, session: Session) -> Self {
        Self {
            store,
            session,
            armed: true,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Advance the guarded session, logging a rejected transition
    pub fn advance(&mut self, next: SessionState) {
        self.session.advance_or_warn(next);
    }

    /// Destroy the session now
    pub async fn run(mut self) {
        self.fire().await;
    }

    async fn fire(&mut self) {
        if std::mem::take(&mut self.armed) {
            self.session.advance_or_warn(SessionState::Destroyed);
            self.store.destroy(&self.session.id).await;
        }
    }
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        if !std::mem::take(&mut self.armed) {
            return;
        }
        self.session.advance_or_warn(SessionState::Destroyed);
        let store = self.store.clone();
        let id = self.session.id.clone();

        debug!(session_id = %id, "Cleanup guard dropped before completion");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    store.destroy(&id).await;
                });
            }
            Err(_) => store.destroy_blocking(&id),
        }
    }
}

/// Stream `path` as an attachment, then destroy the owning session.
///
/// Failures before the response exists are returned as
/// [`ApiError::Stream`] after cleanup. Read errors once headers are out are
/// logged and end the body with an error, which aborts the connection.
pub async fn stream_file(
    path: &Path,
    content_type: &'static str,
    download_name: &str,
    cleanup: SessionCleanup,
) -> ApiResult<Response> {
    let opened = match tokio::fs::File::open(path).await {
        Ok(file) => file.metadata().await.map(|meta| (file, meta.len())),
        Err(e) => Err(e),
    };

    let (file, length) = match opened {
        Ok(pair) => pair,
        Err(e) => {
            cleanup.run().await;
            return Err(ApiError::Stream(format!(
                "Cannot open {}: {}",
                path.display(),
                e
            )));
        }
    };

    let session_id = cleanup.session().id.to_string();
    info!(session_id = %session_id, bytes = length, content_type, "Streaming artifact");

    let body = async_stream::stream! {
        let mut cleanup = cleanup;
        let mut reader = ReaderStream::new(file);
        let mut sent: u64 = 0;
        loop {
            match reader.next().await {
                Some(Ok(chunk)) => {
                    sent += chunk.len() as u64;
                    yield Ok::<Bytes, std::io::Error>(chunk);
                }
                Some(Err(e)) => {
                    warn!(session_id = %session_id, sent, error = %e, "Artifact read failed mid-stream");
                    cleanup.fire().await;
                    yield Err(e);
                    break;
                }
                None => {
                    debug!(session_id = %session_id, sent, "Artifact stream complete");
                    cleanup.fire().await;
                    break;
                }
            }
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download_name),
        )
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::Stream(e.to_string()))
}
