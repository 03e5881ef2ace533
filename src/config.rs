//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$SCANBENCH_CONFIG` (environment variable)
//! 2. `~/.config/scanbench/config.toml` (Linux/macOS)
//!    `%APPDATA%\scanbench\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override whatever is loaded here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanbenchError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Which mail files make up the corpus.
    pub corpus: CorpusConfig,
    /// How the corpus is sent.
    pub load: LoadConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Corpus selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory searched recursively for `.eml`, `.msg` and `.mail` files.
    pub directory: Option<PathBuf>,
    /// Largest accepted file, in KB (1 KB = 1000 bytes).
    pub max_file_size_kb: u64,
    /// Smallest accepted file, in KB.
    pub min_file_size_kb: u64,
    /// Drop files with unreadable headers instead of sending them headerless.
    pub send_headers: bool,
}

/// Load generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Scan endpoint every request is posted to.
    pub uri: Option<String>,
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// How long to send for.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Overall requests per second cap; 0 means unlimited.
    pub qps: u32,
    /// Status code counted as success.
    pub success_status: u16,
    /// Send `Connection: close` and disable connection reuse.
    pub disable_keep_alive: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_file_size_kb: 10_000,
            min_file_size_kb: 0,
            send_headers: false,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            uri: None,
            concurrency: 500,
            duration: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            qps: 0,
            success_status: 200,
            disable_keep_alive: false,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found. A file that exists
/// but cannot be read or parsed also yields the defaults, along with the error
/// for the caller to report once logging is up.
pub fn load_config() -> (Config, Option<ScanbenchError>) {
    match config_file_path() {
        Some(path) if path.exists() => match load_config_from(&path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Config::default(), Some(e)),
        },
        _ => (Config::default(), None),
    }
}

/// Read and parse one config file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| ScanbenchError::io(path, e))?;
    toml::from_str(&contents).map_err(|source| ScanbenchError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("SCANBENCH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("scanbench").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scanbench")
}
