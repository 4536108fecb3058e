//! Pipeline stages for invoice extraction and expense filing.
//!
//! Each submodule implements one step. The I/O-bound steps sit behind a
//! trait ([`text::TextSource`], [`llm::RecordSource`],
//! [`filing::ExpenseBackend`]) so the batch drivers in [`crate::runner`] can
//! be exercised without pdfium, a model, or a network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ clean ──▶ llm ──▶ (store) ──▶ build ──▶ filing
//! (*.pdf)  (pdfium)  (tidy)   (JSON)              (payload)  (POST + move)
//! ```
//!
//! 1. [`input`] : list the PDF documents in the input folder
//! 2. [`text`]  : concatenate page text; runs in `spawn_blocking`
//! 3. [`clean`] : deterministic text tidying and reply fence stripping
//! 4. [`llm`]   : one chat call per document, reply parsed as a record
//! 5. [`build`] : category + tax rules + attachment → backend payload
//! 6. [`filing`]: submit, then move the PDF into the dated archive

pub mod build;
pub mod clean;
pub mod filing;
pub mod input;
pub mod llm;
pub mod text;
