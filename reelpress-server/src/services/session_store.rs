//! Session staging directories
//!
//! The store is the only component that creates or removes session
//! directories. Every directory lives directly under the configured temp
//! root and is named by its sanitized session id.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{Session, SessionId};

/// Maps session ids to staging directories under one temp root
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: Arc<PathBuf>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Directory for `id`. Pure path join, no filesystem access.
    pub fn resolve(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Create the directory (and parents) if absent.
    ///
    /// Create-if-absent, so concurrent first chunks for one session are safe.
    pub async fn ensure(&self, id: &SessionId) -> io::Result<Session> {
        let directory = self.resolve(id);
        tokio::fs::create_dir_all(&directory).await?;
        debug!(session_id = %id, dir = %directory.display(), "Session directory ready");
        Ok(Session::new(id.clone(), directory))
    }

    pub async fn exists(&self, id: &SessionId) -> bool {
        tokio::fs::metadata(self.resolve(id))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Existing session, or `None` if its directory is gone
    pub async fn open(&self, id: &SessionId) -> Option<Session> {
        if self.exists(id).await {
            Some(Session::new(id.clone(), self.resolve(id)))
        } else {
            None
        }
    }

    /// Remove the session directory tree.
    ///
    /// Never fails: a missing directory is a no-op and any other error is
    /// logged and discarded.
    pub async fn destroy(&self, id: &SessionId) {
        let directory = self.resolve(id);
        let result = tokio::fs::remove_dir_all(&directory).await;
        log_destroy(id, &directory, result);
    }

    /// Blocking variant of [`destroy`](Self::destroy) for use outside a runtime
    pub fn destroy_blocking(&self, id: &SessionId) {
        let directory = self.resolve(id);
        let result = std::fs::remove_dir_all(&directory);
        log_destroy(id, &directory, result);
    }
}

fn log_destroy(id: &SessionId, directory: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => info!(session_id = %id, "Session directory removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(session_id = %id, "Session directory already absent")
        }
        Err(e) => warn!(
            session_id = %id,
            dir = %directory.display(),
            error = %e,
            "Failed to remove session directory"
        ),
    }
}
