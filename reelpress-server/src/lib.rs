//! reelpress-server library interface
//!
//! Exposes the router and pipeline services for integration testing

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::ServerConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{
    AudioFetcher, ChunkIngestor, CommandRunner, ProcessRunner, Renderer, SessionStore,
};

/// Application state shared across handlers
///
/// Holds no per-session data; sessions are isolated on disk.
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<ServerConfig>,
    /// Staging directories under `config.temp_root`
    pub sessions: SessionStore,
    /// Frame and audio upload handling
    pub ingestor: ChunkIngestor,
    /// Encoder front end
    pub renderer: Renderer,
    /// Downloader front end
    pub fetcher: AudioFetcher,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State using real subprocesses
    pub fn new(config: ServerConfig) -> Self {
        let runner = Arc::new(CommandRunner::with_timeout(config.process_timeout));
        Self::with_runner(config, runner)
    }

    /// State using a custom process runner for both encoder and downloader
    pub fn with_runner(config: ServerConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let sessions = SessionStore::new(config.temp_root.clone());
        Self {
            ingestor: ChunkIngestor::new(config.upload_limits()),
            renderer: Renderer::new(runner.clone(), config.encoder_program.clone()),
            fetcher: AudioFetcher::new(
                sessions.clone(),
                runner,
                config.downloader_program.clone(),
            ),
            sessions,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes;

    Router::new()
        .merge(api::export_routes())
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
