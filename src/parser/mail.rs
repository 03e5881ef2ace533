//! Turn one raw mail file into a scan request, or decide to leave it out.

use std::fmt;
use std::ops::RangeInclusive;

use http::Uri;

use crate::error::{Result, ScanbenchError};
use crate::model::request::ScanRequest;
use crate::parser::format::{sanitize_mail_file, MailFormat};
use crate::parser::header::{self, MalformedMessage};

/// Why a recognized mail file was left out of the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file size is outside the configured bounds.
    OutOfRange { size: usize },
    /// Headers could not be read and headerless requests are not allowed.
    Unparsable(MalformedMessage),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { size } => write!(f, "size {size} bytes out of range"),
            Self::Unparsable(e) => write!(f, "unparsable headers: {e}"),
        }
    }
}

/// What to do with one mail file.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Goes into the corpus (headered or headerless).
    Accepted(ScanRequest),
    /// Left out; not an error.
    Skipped(SkipReason),
}

/// How files are filtered and which request variant they become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePolicy {
    /// Accepted body sizes in bytes, both ends inclusive.
    pub size_bounds: RangeInclusive<usize>,
    /// Drop files whose headers cannot be read instead of sending them headerless.
    pub send_headers: bool,
}

impl FilePolicy {
    /// Build a policy from kilobyte bounds (1 KB = 1000 bytes).
    ///
    /// Fails when `min_kb > max_kb`, since such a filter accepts nothing.
    pub fn from_kb(min_kb: u64, max_kb: u64, send_headers: bool) -> Result<Self> {
        if min_kb > max_kb {
            return Err(ScanbenchError::InvalidSizeBounds { min_kb, max_kb });
        }
        let to_bytes = |kb: u64| usize::try_from(kb.saturating_mul(1000)).unwrap_or(usize::MAX);
        Ok(Self {
            size_bounds: to_bytes(min_kb)..=to_bytes(max_kb),
            send_headers,
        })
    }
}

/// Decide what a mail file of the given format becomes.
///
/// The request body is always the file's exact bytes. For `.mail` captures
/// the SMTP framing is stripped only to read the headers.
pub fn interpret(uri: &Uri, format: MailFormat, raw: Vec<u8>, policy: &FilePolicy) -> FileOutcome {
    let size = raw.len();
    if !policy.size_bounds.contains(&size) {
        return FileOutcome::Skipped(SkipReason::OutOfRange { size });
    }

    let parsed = match format {
        MailFormat::Mail => header::read_header_block(&sanitize_mail_file(&raw)),
        MailFormat::Eml | MailFormat::Msg => header::read_header_block(&raw),
    };

    match parsed {
        Ok(headers) => {
            let envelope = header::parse_envelope(&headers);
            FileOutcome::Accepted(ScanRequest::headered(uri, &envelope, raw))
        }
        Err(e) if policy.send_headers => FileOutcome::Skipped(SkipReason::Unparsable(e)),
        Err(_) => FileOutcome::Accepted(ScanRequest::headerless(uri, raw)),
    }
}
