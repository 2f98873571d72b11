//! Export session state machine
//!
//! A session progresses linearly through:
//! CREATED → RECEIVING → FINALIZING → STREAMING → DESTROYED
//!
//! States may be skipped but never revisited. DESTROYED is terminal and is
//! reachable from every other state, since any failure ends in cleanup.

use reelpress_common::{id_utils, sanitize_id};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Sanitized, non-empty session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Sanitize untrusted input; `None` when nothing survives.
    ///
    /// An empty id would resolve to the staging root itself.
    pub fn sanitized(raw: &str) -> Option<Self> {
        let id = sanitize_id(raw);
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Fresh server-generated id
    pub fn generate() -> Self {
        Self(id_utils::generate_session_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Staging directory exists, nothing received yet
    Created,
    /// Audio and frame uploads in progress
    Receiving,
    /// Encoder or downloader running
    Finalizing,
    /// Artifact being streamed to the client
    Streaming,
    /// Staging directory removed
    Destroyed,
}

/// Rejected state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// One export or import job bound to a staging directory
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub directory: PathBuf,
    pub state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, directory: PathBuf) -> Self {
        Self {
            id,
            directory,
            state: SessionState::Created,
        }
    }

    /// Move forward to `next`.
    ///
    /// Staying in RECEIVING is allowed so repeated chunk uploads are not
    /// errors; every other transition must strictly advance.
    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        let allowed = match (self.state, next) {
            (SessionState::Destroyed, _) => false,
            (SessionState::Receiving, SessionState::Receiving) => true,
            (current, next) => next > current,
        };

        if !allowed {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(
            session_id = %self.id,
            from = ?self.state,
            to = ?next,
            "Session state transition"
        );
        self.state = next;
        Ok(())
    }

    /// [`advance`](Self::advance), logging a rejected transition instead of
    /// returning it. The state is left unchanged on rejection.
    pub fn advance_or_warn(&mut self, next: SessionState) {
        if let Err(e) = self.advance(next) {
            tracing::warn!(session_id = %self.id, error = %e, "Unexpected session state");
        }
    }
}
