//! Remote audio import via the external downloader
//!
//! Every import gets a fresh server-generated session. The downloader is told
//! to extract audio to a fixed template so the result lands at a predictable
//! path without parsing its output.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::models::{Session, SessionId, SessionState};
use crate::services::{ProcessRunner, SessionCleanup, SessionStore};

/// Extension requested from the downloader
pub const FETCHED_AUDIO_EXT: &str = "mp3";
/// Content type of the fetched artifact
pub const FETCHED_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Audio downloaded into a new session, ready to stream.
///
/// Dropping this without streaming still removes the session.
pub struct FetchedAudio {
    pub cleanup: SessionCleanup,
    pub audio_path: PathBuf,
}

/// Parse and check a caller-supplied URL.
///
/// Only absolute `http`/`https` URLs with a host are accepted; this runs
/// before any session or process is created.
pub fn validate_url(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ApiError::Validation(format!("Invalid URL: {}", e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ApiError::Validation(format!(
                "Unsupported URL scheme: {}",
                other
            )))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ApiError::Validation("URL has no host".to_string()));
    }

    Ok(url)
}

/// Downloads remote audio into a fresh session
#[derive(Clone)]
pub struct AudioFetcher {
    store: SessionStore,
    runner: Arc<dyn ProcessRunner>,
    program: String,
}

impl AudioFetcher {
    pub fn new(
        store: SessionStore,
        runner: Arc<dyn ProcessRunner>,
        program: impl Into<String>,
    ) -> Self {
        Self {
            store,
            runner,
            program: program.into(),
        }
    }

    /// Downloader arguments for `url` into `session`
    pub fn downloader_args(session: &Session, url: &Url) -> Vec<OsString> {
        let template = session.directory.join("audio.%(ext)s");
        vec![
            "-x".into(),
            "--audio-format".into(),
            FETCHED_AUDIO_EXT.into(),
            "--no-playlist".into(),
            "-o".into(),
            template.into_os_string(),
            url.as_str().into(),
        ]
    }

    /// Download audio from `raw_url`.
    ///
    /// On any failure after the session exists, the session is destroyed
    /// before the error is returned. Cancelling the future mid-download
    /// destroys it too.
    pub async fn fetch(&self, raw_url: &str) -> ApiResult<FetchedAudio> {
        let url = validate_url(raw_url)?;

        let session = self.store.ensure(&SessionId::generate()).await?;
        let mut cleanup = SessionCleanup::new(self.store.clone(), session);
        info!(session_id = %cleanup.session().id, url = %url, "Fetching remote audio");

        match self.download(&mut cleanup, &url).await {
            Ok(audio_path) => Ok(FetchedAudio {
                cleanup,
                audio_path,
            }),
            Err(e) => {
                warn!(session_id = %cleanup.session().id, error = %e, "Audio fetch failed");
                cleanup.run().await;
                Err(e)
            }
        }
    }

    async fn download(&self, cleanup: &mut SessionCleanup, url: &Url) -> ApiResult<PathBuf> {
        cleanup.advance(SessionState::Finalizing);
        let session = cleanup.session();

        let args = Self::downloader_args(session, url);
        self.runner.run(&self.program, &args).await?;

        let audio_path = session
            .directory
            .join(format!("audio.{}", FETCHED_AUDIO_EXT));
        if !tokio::fs::try_exists(&audio_path).await.unwrap_or(false) {
            return Err(ApiError::Consistency(format!(
                "{} exited successfully but {} is missing",
                self.program,
                audio_path.display()
            )));
        }

        Ok(audio_path)
    }
}
