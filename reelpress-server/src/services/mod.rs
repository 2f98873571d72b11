//! Export pipeline services
//!
//! Leaves first: session staging, chunk ingestion, external process
//! execution, remote audio fetching, rendering, and artifact streaming.

pub mod audio_fetcher;
pub mod ingest;
pub mod process_runner;
pub mod renderer;
pub mod session_store;
pub mod streamer;

pub use audio_fetcher::{validate_url, AudioFetcher, FetchedAudio};
pub use ingest::{ChunkIngestor, IngestOutcome, StageOutcome, UploadKind, UploadLimits};
pub use process_runner::{CommandRunner, ProcessError, ProcessRunner};
pub use renderer::{RenderJob, Renderer};
pub use session_store::SessionStore;
pub use streamer::{stream_file, SessionCleanup};
