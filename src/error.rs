//! Error types for the edgequake-expenses library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExpensesError`]: **Fatal**: the phase cannot start or cannot persist
//!   its result (missing category mappings, missing prompt template, provider
//!   not configured). Returned as `Err(ExpensesError)` from the phase entry
//!   points in [`crate::runner`].
//!
//! * [`RecordError`]: **Non-fatal**: a single document or record could not be
//!   processed (unreadable PDF, model reply that is not JSON, unknown
//!   category, backend rejection). It is logged, counted in the phase
//!   summary, and the batch moves on to the next item.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-expenses library.
///
/// Per-record failures use [`RecordError`] and never abort a batch.
#[derive(Debug, Error)]
pub enum ExpensesError {
    // ── Startup preconditions ─────────────────────────────────────────────
    /// The category mapping file does not exist.
    #[error(
        "Category mappings configuration not found at '{path}'!\n\
Please copy config/category_mappings.example.toml to config/category_mappings.toml\n\
and update it with your actual accounting contact IDs."
    )]
    CategoryConfigMissing { path: PathBuf },

    /// The category mapping file exists but cannot be parsed.
    #[error("Category mappings at '{path}' are invalid: {detail}")]
    CategoryConfigInvalid { path: PathBuf, detail: String },

    /// The prompt template file does not exist.
    #[error("Prompt file not found at '{path}'. Please create it from prompt.txt.example")]
    PromptMissing { path: PathBuf },

    /// The input directory cannot be listed.
    #[error("Cannot read input folder '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Accounting backend ────────────────────────────────────────────────
    /// The HTTP client for the accounting backend could not be built.
    #[error("Failed to initialise accounting backend client: {0}")]
    BackendClient(String),

    // ── Intermediate store ────────────────────────────────────────────────
    /// Could not write the intermediate expenses store.
    #[error("Failed to write expenses store '{path}': {source}")]
    StoreWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The intermediate store exists but could not be read or decoded.
    #[error("Expenses store '{path}' is unreadable: {detail}\nRe-run the extraction phase to regenerate it.")]
    StoreCorrupt { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed or a required setting is missing.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document or record.
///
/// Every variant carries the source filename so the log line and the
/// progress callback are enough to diagnose the failure.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RecordError {
    /// The PDF produced no text.
    #[error("{filename}: no text could be extracted")]
    NoText { filename: String },

    /// The language-model call failed or its reply was not a JSON object.
    #[error("{filename}: structured extraction failed")]
    ExtractionFailed { filename: String },

    /// The record's category has no entry in the category mappings.
    #[error("{filename}: no category details found for '{category}'")]
    UnknownCategory { filename: String, category: String },

    /// The record's date cannot be turned into an archive location.
    #[error("{filename}: unusable issue date {date:?}")]
    InvalidDate {
        filename: String,
        date: Option<String>,
    },

    /// The source PDF is no longer in the input folder.
    #[error("{filename}: source file not found at '{path}'")]
    SourceMissing { filename: String, path: PathBuf },

    /// The accounting backend rejected the expense or could not be reached.
    #[error("{filename}: error creating expense: {detail}")]
    Rejected { filename: String, detail: String },

    /// The expense was accepted but the source could not be archived.
    #[error("{filename}: expense created but archiving failed: {detail}")]
    ArchiveFailed { filename: String, detail: String },
}

impl RecordError {
    /// Source filename this error refers to.
    pub fn filename(&self) -> &str {
        match self {
            RecordError::NoText { filename }
            | RecordError::ExtractionFailed { filename }
            | RecordError::UnknownCategory { filename, .. }
            | RecordError::InvalidDate { filename, .. }
            | RecordError::SourceMissing { filename, .. }
            | RecordError::Rejected { filename, .. }
            | RecordError::ArchiveFailed { filename, .. } => filename,
        }
    }

    /// `true` for conditions that skip a record without it being a failure
    /// (unknown category, already-archived source).
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            RecordError::UnknownCategory { .. } | RecordError::SourceMissing { .. }
        )
    }
}
