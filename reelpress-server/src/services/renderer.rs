//! Frame + audio muxing via the external encoder
//!
//! Frames must be staged as `frame%06d.<ext>`. Ingestion does not enforce
//! this; gaps or stray names surface as encoder failures.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::models::Session;
use crate::services::ingest::find_audio;
use crate::services::ProcessRunner;

/// Name of the rendered artifact inside the session directory
pub const OUTPUT_FILE_NAME: &str = "output.mp4";
/// Frame file name prefix
pub const FRAME_PREFIX: &str = "frame";
/// Digits in a frame index
pub const FRAME_DIGITS: usize = 6;
/// Frame rate used when the request omits one
pub const DEFAULT_FPS: u32 = 30;
/// Highest accepted frame rate
pub const MAX_FPS: u32 = 240;

/// Everything one encoder invocation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub session_dir: PathBuf,
    pub audio_path: PathBuf,
    pub frame_ext: String,
    pub start_number: u32,
    pub fps: u32,
    pub output_path: PathBuf,
}

impl RenderJob {
    /// `<dir>/frame%06d.<ext>` as handed to the encoder
    pub fn frame_pattern(&self) -> PathBuf {
        self.session_dir.join(format!(
            "{}%0{}d.{}",
            FRAME_PREFIX, FRAME_DIGITS, self.frame_ext
        ))
    }

    /// Encoder argument list.
    ///
    /// H.264/AAC at the fastest preset with yuv420p for player compatibility,
    /// cut to the shorter input, moov atom up front, existing output replaced.
    pub fn encoder_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-framerate".into(),
            self.fps.to_string().into(),
            "-start_number".into(),
            self.start_number.to_string().into(),
            "-i".into(),
            self.frame_pattern().into_os_string(),
            "-i".into(),
            self.audio_path.clone().into_os_string(),
        ];
        args.extend(
            [
                "-c:v", "libx264",
                "-preset", "ultrafast",
                "-pix_fmt", "yuv420p",
                "-c:a", "aac",
                "-shortest",
                "-movflags", "+faststart",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(self.output_path.clone().into_os_string());
        args
    }
}

/// Muxes a session's staged frames and audio into `output.mp4`
#[derive(Clone)]
pub struct Renderer {
    runner: Arc<dyn ProcessRunner>,
    program: String,
}

impl Renderer {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Check preconditions and assemble the job without spawning anything
    pub async fn plan(&self, session: &Session, fps: u32) -> ApiResult<RenderJob> {
        validate_fps(fps)?;

        let dir = &session.directory;
        if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(ApiError::NotFound(format!("Session {} not found", session.id)));
        }

        let audio_path = find_audio(dir).await?.ok_or_else(|| {
            ApiError::Validation(format!("Session {} has no audio file", session.id))
        })?;

        let (start_number, frame_ext) = scan_frames(dir).await?.ok_or_else(|| {
            ApiError::Validation(format!("Session {} has no frames", session.id))
        })?;

        Ok(RenderJob {
            session_dir: dir.clone(),
            audio_path,
            frame_ext,
            start_number,
            fps,
            output_path: dir.join(OUTPUT_FILE_NAME),
        })
    }

    /// Render the session and return the path of the finished video
    pub async fn render(&self, session: &Session, fps: u32) -> ApiResult<PathBuf> {
        let job = self.plan(session, fps).await?;
        let args = job.encoder_args();
        debug!(session_id = %session.id, args = ?args, "Running encoder");

        let start = Instant::now();
        self.runner.run(&self.program, &args).await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !tokio::fs::try_exists(&job.output_path).await.unwrap_or(false) {
            return Err(ApiError::Consistency(format!(
                "{} exited successfully but {} is missing",
                self.program, OUTPUT_FILE_NAME
            )));
        }

        info!(
            session_id = %session.id,
            fps,
            start_number = job.start_number,
            elapsed_ms,
            "Render complete"
        );

        Ok(job.output_path)
    }
}

pub fn validate_fps(fps: u32) -> ApiResult<u32> {
    if (1..=MAX_FPS).contains(&fps) {
        Ok(fps)
    } else {
        Err(ApiError::Validation(format!(
            "fps must be between 1 and {}, got {}",
            MAX_FPS, fps
        )))
    }
}

/// Parse `frame000123.jpg` into `(123, "jpg")`
fn parse_frame_name(name: &str) -> Option<(u32, String)> {
    let rest = name.strip_prefix(FRAME_PREFIX)?;
    let (digits, ext) = rest.split_once('.')?;
    if digits.len() != FRAME_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if ext.is_empty() || ext.contains('.') {
        return None;
    }
    Some((digits.parse().ok()?, ext.to_string()))
}

/// Lowest frame index and its extension, or `None` if no frame is staged
async fn scan_frames(dir: &Path) -> std::io::Result<Option<(u32, String)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut lowest: Option<(u32, String)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some((index, ext)) = parse_frame_name(&name.to_string_lossy()) else {
            continue;
        };
        if lowest.as_ref().map_or(true, |(best, _)| index < *best) {
            lowest = Some((index, ext));
        }
    }

    Ok(lowest)
}
