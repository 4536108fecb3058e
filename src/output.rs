//! Phase results returned to callers.

use crate::error::RecordError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Result of the extraction phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionSummary {
    /// PDF documents found in the input folder.
    pub total: usize,
    /// Records written to the store.
    pub extracted: usize,
    /// Documents left out (no text, or no usable model reply).
    pub failed: usize,
    pub store_path: PathBuf,
    pub failures: Vec<RecordError>,
}

/// Result of the filing phase over a store that exists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilingSummary {
    /// Records in the store.
    pub total: usize,
    /// Expenses accepted by the backend.
    pub filed: usize,
    /// Of `filed`, those whose PDF had vanished before it could be archived.
    pub unarchived: usize,
    /// Records not submitted: unknown category or source already gone.
    pub skipped: usize,
    /// Records that failed: unusable date, backend rejection, archive error.
    pub failed: usize,
    /// Where accepted PDFs were moved.
    pub archived: Vec<PathBuf>,
    pub errors: Vec<RecordError>,
}

/// Outcome of the filing phase.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FilingOutcome {
    /// No store yet: run the extraction phase first.
    StoreMissing { store_path: PathBuf },
    Completed(FilingSummary),
}

/// Read-only overview of the store, for review between the phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreReview {
    pub total: usize,
    /// Record count per category label (`""` for records without one).
    pub by_category: BTreeMap<String, usize>,
    /// Labels with no entry in the category mappings, with their counts.
    pub unknown_categories: BTreeMap<String, usize>,
}

impl StoreReview {
    pub fn has_unknown(&self) -> bool {
        !self.unknown_categories.is_empty()
    }
}
