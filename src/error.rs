//! Centralized error types for scanbench.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the scanbench library.
///
/// Per-file interpretation problems (unknown suffix, size out of range,
/// unparsable headers) are not errors; they are resolved inside the corpus
/// loader into a skip or a headerless fallback.
#[derive(Error, Debug)]
pub enum ScanbenchError {
    /// A recognized mail file could not be read.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The directory walk failed on an entry that looks like a mail file.
    #[error("failed to load mail file '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// No file in the corpus directory survived filtering.
    #[error("no usable mail files found under '{0}'")]
    EmptyCorpus(PathBuf),

    /// The size filter can never accept anything.
    #[error("invalid size bounds: min {min_kb} KB is greater than max {max_kb} KB")]
    InvalidSizeBounds { min_kb: u64, max_kb: u64 },

    /// The destination scan endpoint is not a valid absolute URI.
    #[error("invalid destination URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// A config file exists but is not valid TOML for [`crate::config::Config`].
    #[error("failed to parse config file '{path}': {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Metric registration failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience alias for `Result<T, ScanbenchError>`.
pub type Result<T> = std::result::Result<T, ScanbenchError>;

impl ScanbenchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
