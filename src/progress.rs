//! Progress-callback trait for per-document and per-record events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events while a phase walks its batch. The CLI uses it to drive a progress
//! bar; library users can forward events anywhere they like.
//!
//! # Example
//!
//! ```rust
//! use edgequake_expenses::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, index: usize, total: usize, filename: &str) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} {filename}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .input_dir("/tmp/invoices")
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Which batch phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extraction,
    Filing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Extraction => f.write_str("extraction"),
            Phase::Filing => f.write_str("filing"),
        }
    }
}

/// Called by the phase drivers as they process each item.
///
/// Items are processed one at a time, so events for one phase never
/// interleave. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first item.
    fn on_phase_start(&self, phase: Phase, total: usize) {
        let _ = (phase, total);
    }

    /// Called before an item is processed. `index` is 1-based.
    fn on_item_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when an item went through its phase successfully.
    fn on_item_complete(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when an item was skipped or failed; `reason` is human-readable.
    fn on_item_skipped(&self, index: usize, total: usize, filename: &str, reason: &str) {
        let _ = (index, total, filename, reason);
    }

    /// Called once after every item has been attempted.
    fn on_phase_complete(&self, phase: Phase, total: usize, success_count: usize) {
        let _ = (phase, total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
