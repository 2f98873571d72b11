//! Sanitization of untrusted identifiers and filenames
//!
//! Every path component derived from request input passes through one of
//! these functions before it is joined onto a staging directory.

/// Strip every character outside `[A-Za-z0-9_-]`.
///
/// The result may be empty. An empty id is still a valid id, it just names
/// the staging root itself and so must never be used to share a directory.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Keep only the final path segment of `raw`.
///
/// Both `/` and `\` are treated as separators regardless of platform, so a
/// client on any OS cannot smuggle a directory component through. A final
/// segment of `.` or `..` yields an empty name.
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    match last {
        "." | ".." => String::new(),
        name => name.chars().filter(|c| *c != '\0').collect(),
    }
}

/// Lowercased extension of `name`, restricted to the id alphabet.
///
/// Returns `None` when the name has no extension or nothing survives.
pub fn sanitize_extension(name: &str) -> Option<String> {
    let base = sanitize_filename(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext = sanitize_id(ext).to_ascii_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
