//! # edgequake-expenses
//!
//! Turn emailed PDF invoices into accounting expenses.
//!
//! Invoices land in a folder. The crate reads each PDF's text, asks an LLM
//! for a small JSON record (category, date, currency, pre-tax price, VAT and
//! IRPF percentages), and keeps the batch in an intermediate store that a
//! human can review. A second phase maps every record's category to a
//! supplier contact, posts the expense with the PDF attached to a
//! Quaderno-style accounting API, and moves the PDF into a dated archive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Email Attachments/*.pdf
//!  │
//!  ├─ 1. Extract  pdfium text → prompt → LLM → JSON record
//!  ├─ 2. Store    temp/expenses.json (review it here)
//!  ├─ 3. Resolve  category → contact, description, payment method
//!  ├─ 4. Build    payload with IVA / IRPF lines + base64 attachment
//!  └─ 5. File     POST /expenses, then move to
//!                 <archive>/<year>/<year> - <month> <company> Taxes/invoices/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_expenses::{extract_invoices, file_expenses, FilingOutcome, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .input_dir("/home/me/Email Attachments")
//!         .archive_root("/home/me/Dropbox/Taxes")
//!         .company_name("Acme")
//!         .api_url("https://acme.quadernoapp.com/api/")
//!         .api_key("sk_live_…")
//!         .build()?;
//!
//!     let extracted = extract_invoices(&config).await?;
//!     eprintln!("{}/{} invoices extracted", extracted.extracted, extracted.total);
//!
//!     if let FilingOutcome::Completed(summary) = file_expenses(&config).await? {
//!         eprintln!("{} expenses filed", summary.filed);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `expenses` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! edgequake-expenses = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod categories;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use categories::{CategoryDetails, CategoryResolver, ContactId};
pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_MODEL};
pub use error::{ExpensesError, RecordError};
pub use model::{ExpensePayload, ExtractedRecord};
pub use output::{ExtractionSummary, FilingOutcome, FilingSummary, StoreReview};
pub use pipeline::filing::{ArchiveLayout, ExpenseBackend, QuadernoBackend};
pub use pipeline::llm::RecordSource;
pub use pipeline::text::TextSource;
pub use progress::{NoopProgressCallback, Phase, PipelineProgressCallback, ProgressCallback};
pub use runner::{
    extract_invoices, extract_invoices_sync, file_expenses, file_expenses_sync, review_store,
    run_extraction, run_filing,
};
