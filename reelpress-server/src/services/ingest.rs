//! Chunked frame and audio ingestion
//!
//! Each multipart part is written to a hidden `.part` file and renamed into
//! place once complete, so a concurrent upload or a render never observes a
//! half-written frame.

use axum::body::Bytes;
use axum::extract::Multipart;
use futures::{Stream, StreamExt};
use reelpress_common::id_utils::generate_token;
use reelpress_common::sanitize::{sanitize_extension, sanitize_filename};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{Session, SessionState};
use crate::services::renderer::OUTPUT_FILE_NAME;

/// Multipart field carrying the audio track
pub const AUDIO_FIELD: &str = "audio";
/// Multipart field carrying frame images (repeated)
pub const FRAMES_FIELD: &str = "frames";
/// Stem of the staged audio file
pub const AUDIO_STEM: &str = "audio";
/// Extension used when the uploaded audio name has none
pub const DEFAULT_AUDIO_EXT: &str = "mp3";
/// Longest staged file name in bytes; leaves room for the `.part` suffix
/// and token under the usual 255-byte file name limit
pub const MAX_STAGED_NAME_BYTES: usize = 200;

/// Upload quotas
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Largest single file accepted; larger files are rejected individually
    pub max_file_bytes: u64,
    /// Most files a session may hold over its lifetime
    pub max_files_per_session: usize,
}

/// What a multipart part is staged as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Audio,
    Frame,
}

impl UploadKind {
    fn from_field(name: Option<&str>) -> Option<Self> {
        match name {
            Some(AUDIO_FIELD) => Some(Self::Audio),
            Some(FRAMES_FIELD) => Some(Self::Frame),
            _ => None,
        }
    }
}

/// Result of staging one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Stored(PathBuf),
    TooLarge,
    InvalidName,
}

/// Per-request counts; not cumulative across chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

/// Persists uploaded files into a session directory
#[derive(Debug, Clone)]
pub struct ChunkIngestor {
    limits: UploadLimits,
}

impl ChunkIngestor {
    pub fn new(limits: UploadLimits) -> Self {
        Self { limits }
    }

    /// Stage every `audio` and `frames` part of `multipart` into `session`.
    ///
    /// Oversized or unnamed files are skipped and counted as rejected.
    /// Reaching the session file limit fails the request.
    pub async fn receive(
        &self,
        session: &mut Session,
        multipart: &mut Multipart,
    ) -> ApiResult<IngestOutcome> {
        if session.state < SessionState::Receiving {
            session.advance_or_warn(SessionState::Receiving);
        }

        let mut staged = count_staged(&session.directory).await?;
        let mut outcome = IngestOutcome::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
        {
            let Some(kind) = UploadKind::from_field(field.name()) else {
                debug!(session_id = %session.id, field = ?field.name(), "Skipping unknown field");
                continue;
            };

            if staged >= self.limits.max_files_per_session {
                return Err(ApiError::Validation(format!(
                    "Session file limit of {} reached",
                    self.limits.max_files_per_session
                )));
            }

            let original = field.file_name().unwrap_or_default().to_string();
            match self.stage(&session.directory, kind, &original, field).await? {
                StageOutcome::Stored(_) => {
                    outcome.accepted += 1;
                    staged += 1;
                }
                StageOutcome::TooLarge | StageOutcome::InvalidName => outcome.rejected += 1,
            }
        }

        info!(
            session_id = %session.id,
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            "Chunk received"
        );

        Ok(outcome)
    }

    /// Write one file from `source` into `dir`
    pub async fn stage<S, E>(
        &self,
        dir: &Path,
        kind: UploadKind,
        original_name: &str,
        source: S,
    ) -> ApiResult<StageOutcome>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let Some(target_name) = target_name(kind, original_name) else {
            warn!(name = original_name, "Rejecting upload with unusable file name");
            return Ok(StageOutcome::InvalidName);
        };

        let target = dir.join(&target_name);
        let part = dir.join(format!(".{}.{}.part", target_name, generate_token()));

        let mut file = tokio::fs::File::create(&part).await?;
        let copied = copy_limited(&mut file, source, self.limits.max_file_bytes).await;
        drop(file);

        match copied {
            Ok(Some(bytes)) => {
                if kind == UploadKind::Audio {
                    remove_other_audio(dir, &target_name).await?;
                }
                tokio::fs::rename(&part, &target).await?;
                debug!(file = %target.display(), bytes, "Staged file");
                Ok(StageOutcome::Stored(target))
            }
            Ok(None) => {
                discard(&part).await;
                warn!(
                    name = original_name,
                    limit = self.limits.max_file_bytes,
                    "Rejecting oversized upload"
                );
                Ok(StageOutcome::TooLarge)
            }
            Err(e) => {
                discard(&part).await;
                Err(e)
            }
        }
    }
}

/// Copy `source` into `file`; `Ok(None)` once more than `limit` bytes arrive
async fn copy_limited<S, E>(
    file: &mut tokio::fs::File,
    source: S,
    limit: u64,
) -> ApiResult<Option<u64>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut source = std::pin::pin!(source);
    let mut written: u64 = 0;

    while let Some(chunk) = source.next().await {
        let chunk =
            chunk.map_err(|e| ApiError::Validation(format!("Upload interrupted: {}", e)))?;
        written = written.saturating_add(chunk.len() as u64);
        if written > limit {
            return Ok(None);
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(Some(written))
}

/// Final on-disk name, or `None` if the upload cannot be named safely
fn target_name(kind: UploadKind, original_name: &str) -> Option<String> {
    let name = match kind {
        UploadKind::Audio => {
            let ext = sanitize_extension(original_name)
                .unwrap_or_else(|| DEFAULT_AUDIO_EXT.to_string());
            format!("{}.{}", AUDIO_STEM, ext)
        }
        UploadKind::Frame => {
            let name = sanitize_filename(original_name);
            let reserved = name.starts_with('.')
                || name == OUTPUT_FILE_NAME
                || is_audio_name(&name);
            if name.is_empty() || reserved {
                return None;
            }
            name
        }
    };
    (name.len() <= MAX_STAGED_NAME_BYTES).then_some(name)
}

fn is_audio_name(name: &str) -> bool {
    Path::new(name)
        .file_stem()
        .is_some_and(|stem| stem == AUDIO_STEM)
}

/// Staged audio file in `dir`, if any
///
/// When several `audio.*` files exist the lexically first wins, so lookup
/// stays deterministic.
pub async fn find_audio(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_audio_name(&name) && entry.file_type().await?.is_file() {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

/// Remove audio files other than `keep` so a re-upload in another format
/// does not leave two candidates behind
async fn remove_other_audio(dir: &Path, keep: &str) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name != keep && is_audio_name(&name) {
            discard(&entry.path()).await;
        }
    }
    Ok(())
}

/// Visible files in `dir`; in-flight `.part` files are not counted
async fn count_staged(dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            count += 1;
        }
    }
    Ok(count)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(file = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tempfile::TempDir;

    fn ingestor(max_file_bytes: u64) -> ChunkIngestor {
        ChunkIngestor::new(UploadLimits {
            max_file_bytes,
            max_files_per_session: 100,
        })
    }

    fn body(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_frame_keeps_base_name() {
        let temp = TempDir::new().unwrap();
        let outcome = ingestor(1024)
            .stage(
                temp.path(),
                UploadKind::Frame,
                "../../frame000001.jpg",
                body(&["abc", "def"]),
            )
            .await
            .unwrap();

        let expected = temp.path().join("frame000001.jpg");
        assert_eq!(outcome, StageOutcome::Stored(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_audio_is_renamed() {
        let temp = TempDir::new().unwrap();
        let ing = ingestor(1024);

        ing.stage(temp.path(), UploadKind::Audio, "My Song.WAV", body(&["w"]))
            .await
            .unwrap();
        assert!(temp.path().join("audio.wav").exists());

        ing.stage(temp.path(), UploadKind::Audio, "", body(&["m"]))
            .await
            .unwrap();
        assert!(temp.path().join("audio.mp3").exists());
        assert!(!temp.path().join("audio.wav").exists());

        assert_eq!(
            find_audio(temp.path()).await.unwrap(),
            Some(temp.path().join("audio.mp3"))
        );
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_without_residue() {
        let temp = TempDir::new().unwrap();
        let outcome = ingestor(4)
            .stage(temp.path(), UploadKind::Frame, "frame000001.jpg", body(&["abc", "de"]))
            .await
            .unwrap();

        assert_eq!(outcome, StageOutcome::TooLarge);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_reserved_and_empty_names_rejected() {
        let temp = TempDir::new().unwrap();
        let ing = ingestor(1024);

        for name in ["", "dir/", "..", ".hidden.jpg", "output.mp4", "audio.mp3"] {
            let outcome = ing
                .stage(temp.path(), UploadKind::Frame, name, body(&["x"]))
                .await
                .unwrap();
            assert_eq!(outcome, StageOutcome::InvalidName, "name {name:?}");
        }
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_overlong_names_rejected() {
        let temp = TempDir::new().unwrap();
        let ing = ingestor(1024);

        let longest = format!("{}.jpg", "a".repeat(MAX_STAGED_NAME_BYTES - 4));
        let outcome = ing
            .stage(temp.path(), UploadKind::Frame, &longest, body(&["x"]))
            .await
            .unwrap();
        assert_eq!(outcome, StageOutcome::Stored(temp.path().join(&longest)));

        let too_long = format!("{}.jpg", "a".repeat(248));
        let outcome = ing
            .stage(temp.path(), UploadKind::Frame, &too_long, body(&["x"]))
            .await
            .unwrap();
        assert_eq!(outcome, StageOutcome::InvalidName);

        let long_ext = format!("song.{}", "m".repeat(240));
        let outcome = ing
            .stage(temp.path(), UploadKind::Audio, &long_ext, body(&["x"]))
            .await
            .unwrap();
        assert_eq!(outcome, StageOutcome::InvalidName);

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_upload_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let source = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err("connection reset"),
        ]);

        let err = ingestor(1024)
            .stage(temp.path(), UploadKind::Frame, "frame000001.jpg", source)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_find_audio_absent() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("frame000001.jpg"), b"x").unwrap();
        assert_eq!(find_audio(temp.path()).await.unwrap(), None);
    }
}
