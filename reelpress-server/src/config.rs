//! Configuration resolution for reelpress-server
//!
//! Priority for every setting: CLI argument → environment variable →
//! TOML config file → compiled default. Clap merges the first two.

use clap::Parser;
use reelpress_common::config::{resolve_temp_root, TomlConfig};
use reelpress_common::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::UploadLimits;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5740";
pub const DEFAULT_MAX_FILE_BYTES: u64 = 25 * 1024 * 1024;
pub const DEFAULT_MAX_FILES_PER_SESSION: usize = 20_000;
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 512 * 1024 * 1024;
pub const DEFAULT_ENCODER: &str = "ffmpeg";
pub const DEFAULT_DOWNLOADER: &str = "yt-dlp";

/// Command-line arguments for reelpress-server
#[derive(Parser, Debug, Default)]
#[command(name = "reelpress-server")]
#[command(about = "Frame/audio export and remote audio import service")]
#[command(version)]
pub struct Args {
    /// Explicit config file (default: ~/.config/reelpress/config.toml)
    #[arg(short, long, env = "REELPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for session staging directories
    #[arg(short, long, env = "REELPRESS_TEMP_ROOT")]
    pub temp_root: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "REELPRESS_BIND")]
    pub bind: Option<String>,

    /// Largest single uploaded file in bytes
    #[arg(long, env = "REELPRESS_MAX_FILE_BYTES")]
    pub max_file_bytes: Option<u64>,

    /// Most files one session may hold
    #[arg(long, env = "REELPRESS_MAX_FILES_PER_SESSION")]
    pub max_files_per_session: Option<usize>,

    /// Largest request body in bytes
    #[arg(long, env = "REELPRESS_MAX_REQUEST_BYTES")]
    pub max_request_bytes: Option<usize>,

    /// Encoder executable
    #[arg(long, env = "REELPRESS_ENCODER")]
    pub encoder: Option<String>,

    /// Downloader executable
    #[arg(long, env = "REELPRESS_DOWNLOADER")]
    pub downloader: Option<String>,

    /// Kill external processes after this many seconds (0 disables)
    #[arg(long, env = "REELPRESS_PROCESS_TIMEOUT_SECS")]
    pub process_timeout_secs: Option<u64>,
}

/// Resolved server configuration, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub temp_root: PathBuf,
    pub bind_addr: SocketAddr,
    pub max_file_bytes: u64,
    pub max_files_per_session: usize,
    pub max_request_bytes: usize,
    pub encoder_program: String,
    pub downloader_program: String,
    pub process_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Compiled defaults rooted at `temp_root`
    pub fn with_temp_root(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5740))),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files_per_session: DEFAULT_MAX_FILES_PER_SESSION,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            encoder_program: DEFAULT_ENCODER.to_string(),
            downloader_program: DEFAULT_DOWNLOADER.to_string(),
            process_timeout: None,
        }
    }

    /// Load the TOML file named by `args` (or the default location) and merge
    pub fn resolve(args: &Args) -> Result<Self> {
        let toml = TomlConfig::load_or_default(args.config.as_deref())?;
        Self::from_sources(args, &toml)
    }

    /// Merge CLI/env values over TOML values over defaults
    pub fn from_sources(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let defaults = Self::with_temp_root(resolve_temp_root(args.temp_root.clone(), toml));

        let bind_addr = match args.bind.as_ref().or(toml.bind_addr.as_ref()) {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid bind address {:?}: {}", raw, e)))?,
            None => defaults.bind_addr,
        };

        let max_file_bytes = args
            .max_file_bytes
            .or(toml.max_file_bytes)
            .unwrap_or(defaults.max_file_bytes);
        let max_files_per_session = args
            .max_files_per_session
            .or(toml.max_files_per_session)
            .unwrap_or(defaults.max_files_per_session);
        let max_request_bytes = args
            .max_request_bytes
            .or(toml.max_request_bytes)
            .unwrap_or(defaults.max_request_bytes);

        if max_file_bytes == 0 || max_files_per_session == 0 || max_request_bytes == 0 {
            return Err(Error::Config("Upload limits must be greater than zero".to_string()));
        }

        let process_timeout = args
            .process_timeout_secs
            .or(toml.process_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            bind_addr,
            max_file_bytes,
            max_files_per_session,
            max_request_bytes,
            encoder_program: args
                .encoder
                .clone()
                .or_else(|| toml.encoder_program.clone())
                .unwrap_or(defaults.encoder_program),
            downloader_program: args
                .downloader
                .clone()
                .or_else(|| toml.downloader_program.clone())
                .unwrap_or(defaults.downloader_program),
            process_timeout,
            temp_root: defaults.temp_root,
        })
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_bytes: self.max_file_bytes,
            max_files_per_session: self.max_files_per_session,
        }
    }
}
