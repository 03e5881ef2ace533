//! Corpus construction: walk a directory tree and build one request per usable mail file.

use std::path::{Path, PathBuf};

use http::Uri;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::corpus::stats::CorpusStats;
use crate::error::{Result, ScanbenchError};
use crate::model::request::ScanRequest;
use crate::parser::format::MailFormat;
use crate::parser::mail::{self, FileOutcome, FilePolicy};

/// The accepted requests of one corpus directory, in walk order.
#[derive(Debug, Clone)]
pub struct Corpus {
    /// Directory the corpus was loaded from.
    pub root: PathBuf,
    /// Scan endpoint every request targets.
    pub uri: Uri,
    /// One request per accepted file.
    pub requests: Vec<ScanRequest>,
    /// Aggregates over `requests`, plus skip counters.
    pub stats: CorpusStats,
}

/// Parse and validate the destination scan endpoint.
pub fn parse_uri(uri: &str) -> Result<Uri> {
    let parsed: Uri = uri.parse().map_err(|e: http::uri::InvalidUri| {
        ScanbenchError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        }
    })?;
    if parsed.scheme().is_none() || parsed.authority().is_none() {
        return Err(ScanbenchError::InvalidUri {
            uri: uri.to_string(),
            reason: "scheme and host are required".to_string(),
        });
    }
    Ok(parsed)
}

/// Walk `directory` recursively and build the request corpus.
///
/// Files are visited in file-name order within each directory. Files with an
/// unrecognized suffix are ignored, whatever state they are in. A recognized
/// mail file that cannot be read aborts the whole load.
///
/// `progress` is called with the number of accepted files after each one.
pub fn load_corpus(
    uri: &Uri,
    directory: &Path,
    policy: &FilePolicy,
    progress: Option<&dyn Fn(usize)>,
) -> Result<Corpus> {
    info!(uri = %uri, directory = %directory.display(), "Loading corpus");

    if !directory.is_dir() {
        return Err(ScanbenchError::io(
            directory,
            std::io::Error::new(std::io::ErrorKind::NotFound, "corpus directory not found"),
        ));
    }

    let mut requests = Vec::new();
    let mut stats = CorpusStats::default();

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let failed = e.path().map(Path::to_path_buf);
                match failed {
                    Some(path) if MailFormat::from_path(&path).is_some() => {
                        return Err(ScanbenchError::Walk { path, source: e });
                    }
                    _ => {
                        warn!(error = %e, "Skipping unreadable directory entry");
                        continue;
                    }
                }
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(format) = MailFormat::from_path(path) else {
            continue;
        };

        debug!(path = %path.display(), "Reading mail file");
        let raw = std::fs::read(path).map_err(|e| ScanbenchError::io(path, e))?;

        match mail::interpret(uri, format, raw, policy) {
            FileOutcome::Accepted(request) => {
                if !request.detail().has_headers {
                    debug!(path = %path.display(), "Headers unreadable, sending raw body");
                }
                stats.record_accepted(request.detail());
                requests.push(request);
                if let Some(cb) = progress {
                    cb(requests.len());
                }
            }
            FileOutcome::Skipped(reason) => {
                debug!(path = %path.display(), %reason, "Skipping mail file");
                stats.record_skipped(&reason);
            }
        }
    }

    info!(
        directory = %directory.display(),
        count = stats.count,
        headered = stats.headered,
        headerless = stats.headerless,
        skipped_size = stats.skipped_size,
        skipped_unparsable = stats.skipped_unparsable,
        "Corpus loaded"
    );

    Ok(Corpus {
        root: directory.to_path_buf(),
        uri: uri.clone(),
        requests,
        stats,
    })
}
