//! Session id resolution for upload endpoints
//!
//! Precedence, first non-blank wins:
//! 1. Query parameter `sessionId`
//! 2. Header `x-session-id`
//!
//! A value that sanitizes to nothing counts as blank. When nothing resolves
//! the caller decides: `init` generates an id, `chunk` rejects the request.

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::models::SessionId;

pub const SESSION_ID_QUERY: &str = "sessionId";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Query string of the upload endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Resolve the session id of an upload request
pub fn resolve_session_id(query: &SessionQuery, headers: &HeaderMap) -> Option<SessionId> {
    let from_query = query.session_id.as_deref();
    let from_header = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    [from_query, from_header]
        .into_iter()
        .flatten()
        .find_map(SessionId::sanitized)
}
