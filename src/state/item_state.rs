/// Item state definitions for tracking harvest progress
///
/// This module defines every outcome an advert URL can end a run with.
use std::fmt;

/// Final state of one scheduled advert URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemState {
    // ===== Success =====
    /// Fetched, extracted and appended to the store
    Persisted,

    // ===== Errors =====
    /// Fetch failed in a way that retrying cannot fix (bad URL, 404, ...)
    FetchFailed,

    /// Every allowed attempt ended in a transient failure
    RetriesExhausted,

    /// The page did not have the expected structure
    ExtractionFailed,

    /// The record's text cannot be written in the store codepage
    EncodingSkipped,
}

impl ItemState {
    /// Returns true if the advert ended up in the store
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Persisted)
    }

    /// Returns true if the advert was given up on
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed
                | Self::RetriesExhausted
                | Self::ExtractionFailed
                | Self::EncodingSkipped
        )
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::FetchFailed => "fetch_failed",
            Self::RetriesExhausted => "retries_exhausted",
            Self::ExtractionFailed => "extraction_failed",
            Self::EncodingSkipped => "encoding_skipped",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
