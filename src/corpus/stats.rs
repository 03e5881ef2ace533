//! Corpus-wide size and composition statistics.

use serde::Serialize;

use crate::model::request::BodyDetail;
use crate::parser::mail::SkipReason;

/// Aggregates over the accepted corpus, plus counters for skipped files.
///
/// Sizes only ever reflect accepted files; skipped files are counted but
/// never contribute to the total, average, minimum or maximum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusStats {
    /// Number of accepted files.
    pub count: usize,
    /// Accepted files sent with envelope headers.
    pub headered: usize,
    /// Accepted files sent as raw bodies.
    pub headerless: usize,
    /// Sum of accepted body sizes in bytes.
    pub total_bytes: u64,
    /// Smallest accepted body, `None` until the first file is accepted.
    pub min_size: Option<usize>,
    /// Largest accepted body, `None` until the first file is accepted.
    pub max_size: Option<usize>,
    /// Recognized files dropped for their size.
    pub skipped_size: usize,
    /// Recognized files dropped because their headers could not be read.
    pub skipped_unparsable: usize,
}

impl CorpusStats {
    /// Account for one accepted request.
    pub fn record_accepted(&mut self, detail: BodyDetail) {
        self.count += 1;
        if detail.has_headers {
            self.headered += 1;
        } else {
            self.headerless += 1;
        }
        self.total_bytes += detail.size as u64;
        self.min_size = Some(self.min_size.map_or(detail.size, |m| m.min(detail.size)));
        self.max_size = Some(self.max_size.map_or(detail.size, |m| m.max(detail.size)));
    }

    /// Account for one skipped file.
    pub fn record_skipped(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::OutOfRange { .. } => self.skipped_size += 1,
            SkipReason::Unparsable(_) => self.skipped_unparsable += 1,
        }
    }

    /// Mean body size in bytes, `None` for an empty corpus.
    pub fn avg_size(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_bytes as f64 / self.count as f64)
    }
}
