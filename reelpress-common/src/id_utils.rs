//! Session id utilities

use uuid::Uuid;

/// Generate a new session id.
///
/// Random v4 UUID in simple form (32 lowercase hex digits), which already
/// lies inside the sanitized id alphabet.
pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Short random token for temp file names
pub fn generate_token() -> String {
    let mut id = generate_session_id();
    id.truncate(12);
    id
}
