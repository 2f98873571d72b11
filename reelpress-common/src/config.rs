//! Configuration file loading and temp root resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Optional settings read from `config.toml`
///
/// Every field is optional; anything missing falls through to the compiled
/// default of the consuming service.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Root directory under which session staging directories are created
    pub temp_root: Option<PathBuf>,
    /// Socket address to listen on, e.g. `127.0.0.1:5740`
    pub bind_addr: Option<String>,
    /// Per-file upload limit in bytes
    pub max_file_bytes: Option<u64>,
    /// Lifetime file limit per session
    pub max_files_per_session: Option<usize>,
    /// Upper bound on a single request body in bytes
    pub max_request_bytes: Option<usize>,
    /// Encoder executable (name on PATH or absolute path)
    pub encoder_program: Option<String>,
    /// Downloader executable (name on PATH or absolute path)
    pub downloader_program: Option<String>,
    /// Kill external processes after this many seconds
    pub process_timeout_secs: Option<u64>,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load from an explicit path, or the platform default location.
    ///
    /// A missing default file yields an empty config. A file that exists but
    /// fails to parse is logged and ignored, never fatal at startup.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let Some(path) = default_config_path() else {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        match Self::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config file");
                Ok(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Ok(Self::default())
            }
        }
    }
}

/// Locate the default configuration file for the platform
///
/// Linux checks `~/.config/reelpress/config.toml` then
/// `/etc/reelpress/config.toml`; other platforms only the user config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("reelpress").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/reelpress/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS temp directory joined with `reelpress`
pub fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("reelpress")
}

/// Temp root resolution, first hit wins:
/// 1. Command-line argument or environment variable (already merged by clap)
/// 2. TOML config file
/// 3. OS temp directory
pub fn resolve_temp_root(cli_or_env: Option<PathBuf>, toml: &TomlConfig) -> PathBuf {
    cli_or_env
        .or_else(|| toml.temp_root.clone())
        .unwrap_or_else(default_temp_root)
}
