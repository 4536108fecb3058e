//! Batch drivers for the two pipeline phases.
//!
//! The phases are run separately because a human reviews the store between
//! them:
//!
//! ```text
//! extract:  input/*.pdf ──▶ text ──▶ LLM ──▶ temp/expenses.json
//! review:   temp/expenses.json ──▶ per-category counts, unknown categories
//! file:     temp/expenses.json ──▶ category ──▶ payload ──▶ backend ──▶ archive
//! ```
//!
//! Both phases walk their batch strictly one item at a time. A failure on
//! one item is logged, counted and reported to the progress callback; the
//! batch always continues. Only startup preconditions (missing mappings,
//! missing prompt, missing settings) and store I/O abort a phase.
//!
//! [`extract_invoices`] and [`file_expenses`] wire the production
//! implementations; [`run_extraction`] and [`run_filing`] take the stage
//! implementations as parameters.

use crate::categories::CategoryResolver;
use crate::config::PipelineConfig;
use crate::error::{ExpensesError, RecordError};
use crate::model::ExtractedRecord;
use crate::output::{ExtractionSummary, FilingOutcome, FilingSummary, StoreReview};
use crate::pipeline::build::{build_payload, read_attachment};
use crate::pipeline::clean::clean_text;
use crate::pipeline::filing::{ExpenseBackend, Filed, FilingCoordinator, QuadernoBackend};
use crate::pipeline::input::list_documents;
use crate::pipeline::llm::{resolve_provider, RecordSource, StructuredExtractor};
use crate::pipeline::text::{PdfiumText, TextSource};
use crate::progress::{NoopProgressCallback, Phase, PipelineProgressCallback};
use crate::prompts::PromptTemplate;
use crate::store::{read_store, write_store};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the extraction phase with the production stages: pdfium for text and
/// the configured LLM provider for structure.
///
/// # Errors
/// Fatal only: missing prompt template, unreadable input folder, provider
/// not configured, store write failure.
pub async fn extract_invoices(config: &PipelineConfig) -> Result<ExtractionSummary, ExpensesError> {
    let template = PromptTemplate::load(config.prompt_file())?;
    let provider = resolve_provider(config)?;
    let extractor = StructuredExtractor::new(provider, template, config);
    run_extraction(config, &PdfiumText, &extractor).await
}

/// Run the filing phase against the configured accounting backend.
///
/// # Errors
/// Fatal only: missing/invalid category mappings, missing filing settings,
/// backend client construction, unreadable store.
pub async fn file_expenses(config: &PipelineConfig) -> Result<FilingOutcome, ExpensesError> {
    let categories = CategoryResolver::load(&config.category_config)?;
    let (url, key) = config.backend_credentials()?;
    let backend = QuadernoBackend::new(url, key, config.api_timeout_secs)?;
    debug!("Filing expenses to {}", backend.endpoint());
    run_filing(config, &categories, &backend).await
}

/// Synchronous wrapper around [`extract_invoices`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_invoices_sync(config: &PipelineConfig) -> Result<ExtractionSummary, ExpensesError> {
    runtime()?.block_on(extract_invoices(config))
}

/// Synchronous wrapper around [`file_expenses`].
pub fn file_expenses_sync(config: &PipelineConfig) -> Result<FilingOutcome, ExpensesError> {
    runtime()?.block_on(file_expenses(config))
}

fn runtime() -> Result<tokio::runtime::Runtime, ExpensesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExpensesError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

/// Extraction phase: every PDF in the input folder → one record in the store.
///
/// The store is overwritten with the records that survived, in filename
/// order. Documents that yield no text or no usable model reply are left
/// out and listed in the summary.
pub async fn run_extraction<T, R>(
    config: &PipelineConfig,
    text_source: &T,
    record_source: &R,
) -> Result<ExtractionSummary, ExpensesError>
where
    T: TextSource,
    R: RecordSource,
{
    let start = Instant::now();
    let progress = progress_of(config);
    let documents = list_documents(&config.input_dir)?;
    let total = documents.len();
    info!(
        "Processing {} PDF invoices from {}",
        total,
        config.input_dir.display()
    );
    progress.on_phase_start(Phase::Extraction, total);

    let mut records: Vec<ExtractedRecord> = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (i, doc) in documents.iter().enumerate() {
        let index = i + 1;
        info!("Processing {}", doc.filename);
        progress.on_item_start(index, total, &doc.filename);

        let text = clean_text(&text_source.extract_text(&doc.path).await);
        let outcome = if text.is_empty() {
            Err(RecordError::NoText {
                filename: doc.filename.clone(),
            })
        } else {
            record_source
                .extract_record(&doc.filename, &text)
                .await
                .ok_or_else(|| RecordError::ExtractionFailed {
                    filename: doc.filename.clone(),
                })
        };

        match outcome {
            Ok(mut record) => {
                record.filename = doc.filename.clone();
                records.push(record);
                progress.on_item_complete(index, total, &doc.filename);
            }
            Err(e) => {
                warn!("{}", e);
                progress.on_item_skipped(index, total, &doc.filename, &e.to_string());
                failures.push(e);
            }
        }
    }

    let store_path = config.store_path();
    write_store(&store_path, &records)?;
    progress.on_phase_complete(Phase::Extraction, total, records.len());

    info!(
        "Extraction complete: {}/{} documents, {}ms",
        records.len(),
        total,
        start.elapsed().as_millis()
    );

    Ok(ExtractionSummary {
        total,
        extracted: records.len(),
        failed: failures.len(),
        store_path,
        failures,
    })
}

/// Filing phase: every record in the store → expense + archived PDF.
///
/// A missing store is [`FilingOutcome::StoreMissing`], not an error.
pub async fn run_filing<B: ExpenseBackend>(
    config: &PipelineConfig,
    categories: &CategoryResolver,
    backend: &B,
) -> Result<FilingOutcome, ExpensesError> {
    let store_path = config.store_path();

    let Some(records) = read_store(&store_path)? else {
        warn!(
            "No expenses store found at {}. Run the extraction phase first.",
            store_path.display()
        );
        return Ok(FilingOutcome::StoreMissing { store_path });
    };
    let layout = config.archive_layout()?;

    let progress = progress_of(config);
    let coordinator = FilingCoordinator::new(backend, &layout);
    let total = records.len();
    let mut summary = FilingSummary {
        total,
        ..Default::default()
    };
    progress.on_phase_start(Phase::Filing, total);

    for (i, record) in records.iter().enumerate() {
        let index = i + 1;
        progress.on_item_start(index, total, &record.filename);

        match file_record(config, categories, &coordinator, record).await {
            Ok(filed) => {
                summary.filed += 1;
                match filed {
                    Filed::Archived(path) => summary.archived.push(path),
                    Filed::SourceMissing { .. } => summary.unarchived += 1,
                }
                progress.on_item_complete(index, total, &record.filename);
            }
            Err(e) => {
                warn!("{}. Skipping...", e);
                if e.is_skip() {
                    summary.skipped += 1;
                } else {
                    summary.failed += 1;
                }
                progress.on_item_skipped(index, total, &record.filename, &e.to_string());
                summary.errors.push(e);
            }
        }
    }

    progress.on_phase_complete(Phase::Filing, total, summary.filed);
    info!(
        "Filing complete: {} filed, {} skipped, {} failed (of {})",
        summary.filed, summary.skipped, summary.failed, total
    );
    Ok(FilingOutcome::Completed(summary))
}

/// Resolve, build and file one record.
async fn file_record<B: ExpenseBackend>(
    config: &PipelineConfig,
    categories: &CategoryResolver,
    coordinator: &FilingCoordinator<'_, B>,
    record: &ExtractedRecord,
) -> Result<Filed, RecordError> {
    let label = record.category_label();
    let details = categories
        .resolve(label)
        .ok_or_else(|| RecordError::UnknownCategory {
            filename: record.filename.clone(),
            category: label.to_string(),
        })?;

    if record.year_month().is_none() {
        return Err(RecordError::InvalidDate {
            filename: record.filename.clone(),
            date: record.date.clone(),
        });
    }

    // A source that is already gone was filed by an earlier run (or removed
    // by hand); submitting again would duplicate the expense. Only bare
    // names inside the input folder are ever filed or moved.
    let source = config.source_path(&record.filename);
    if !is_bare_file_name(&record.filename) || !source.is_file() {
        return Err(RecordError::SourceMissing {
            filename: record.filename.clone(),
            path: source,
        });
    }

    if record.pre_tax_price.is_none() {
        if let Some(raw) = record.extra.get("pre_tax_price") {
            warn!("{}: pre_tax_price {} is not a number", record.filename, raw);
        }
    }

    let attachment = read_attachment(&source);
    let payload = build_payload(record, details, attachment.as_deref());
    info!("Creating expense for {}...", label);
    coordinator.file(&payload, &source).await
}

/// `true` for a non-empty name with exactly one path component.
fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty() && Path::new(name).file_name() == Some(OsStr::new(name))
}

/// Summarise the store without touching the backend.
///
/// `Ok(None)` when the store does not exist yet.
pub fn review_store(
    store_path: &Path,
    categories: &CategoryResolver,
) -> Result<Option<StoreReview>, ExpensesError> {
    let Some(records) = read_store(store_path)? else {
        return Ok(None);
    };

    let mut review = StoreReview {
        total: records.len(),
        ..Default::default()
    };
    for record in &records {
        let label = record.category_label();
        *review.by_category.entry(label.to_string()).or_default() += 1;
        if !categories.contains(label) {
            *review.unknown_categories.entry(label.to_string()).or_default() += 1;
        }
    }
    Ok(Some(review))
}

fn progress_of(config: &PipelineConfig) -> &dyn PipelineProgressCallback {
    match config.progress_callback {
        Some(ref cb) => cb.as_ref(),
        None => &NoopProgressCallback,
    }
}
