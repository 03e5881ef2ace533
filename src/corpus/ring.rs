//! A fixed circular sequence of scan requests shared by all workers.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::Uri;
use tracing::info;

use crate::corpus::loader::{self, Corpus};
use crate::corpus::stats::CorpusStats;
use crate::error::{Result, ScanbenchError};
use crate::model::request::ScanRequest;
use crate::parser::mail::FilePolicy;

/// Round-robin access to a pre-built, immutable request corpus.
///
/// The ring is never empty. [`MessagesRing::next_message`] may be called from
/// any number of threads through a shared reference: each call advances a
/// single atomic cursor, so the global sequence of served requests is a strict
/// repeating round robin over the corpus, starting with the first entry.
#[derive(Debug)]
pub struct MessagesRing {
    uri: Uri,
    messages: Vec<ScanRequest>,
    /// Slot served by the most recent call.
    cursor: AtomicUsize,
    stats: CorpusStats,
    avg_size: f64,
    min_size: usize,
    max_size: usize,
}

impl MessagesRing {
    /// Load the corpus under `directory` and arrange it into a ring.
    ///
    /// Size bounds are in kilobytes (1 KB = 1000 bytes). With `send_headers`,
    /// files whose headers cannot be read are dropped instead of being sent
    /// headerless. Fails if nothing is left to send.
    pub fn new(
        uri: &str,
        directory: impl AsRef<Path>,
        max_file_size_kb: u64,
        min_file_size_kb: u64,
        send_headers: bool,
    ) -> Result<Self> {
        let uri = loader::parse_uri(uri)?;
        let policy = FilePolicy::from_kb(min_file_size_kb, max_file_size_kb, send_headers)?;
        let corpus = loader::load_corpus(&uri, directory.as_ref(), &policy, None)?;
        Self::from_corpus(corpus)
    }

    /// Arrange an already loaded corpus into a ring.
    pub fn from_corpus(corpus: Corpus) -> Result<Self> {
        let Corpus {
            root,
            uri,
            requests,
            stats,
        } = corpus;

        if requests.is_empty() {
            return Err(ScanbenchError::EmptyCorpus(root));
        }
        let (Some(avg_size), Some(min_size), Some(max_size)) =
            (stats.avg_size(), stats.min_size, stats.max_size)
        else {
            return Err(ScanbenchError::EmptyCorpus(root));
        };

        info!(
            uri = %uri,
            directory = %root.display(),
            messages = requests.len(),
            avg_size,
            min_size,
            max_size,
            "Messages ring ready"
        );

        let last = requests.len() - 1;
        Ok(Self {
            uri,
            messages: requests,
            cursor: AtomicUsize::new(last),
            stats,
            avg_size,
            min_size,
            max_size,
        })
    }

    /// Advance the cursor by one slot (wrapping) and return the request there.
    ///
    /// Advance and read form one atomic step: no two callers ever receive the
    /// same slot from the same advance.
    pub fn next_message(&self) -> &ScanRequest {
        let len = self.messages.len();
        // Slots are immutable, so only the cursor's own modification order matters.
        let prev = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        &self.messages[(prev + 1) % len]
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Mean body size in bytes.
    pub fn avg_size(&self) -> f64 {
        self.avg_size
    }

    /// Smallest body size in bytes.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Largest body size in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    /// The underlying requests in ring order.
    pub fn messages(&self) -> &[ScanRequest] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`; an empty ring cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
