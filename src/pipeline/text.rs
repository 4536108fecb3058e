//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a blocking C++ library with thread-local state. Each document is
//! read on tokio's blocking pool so the runtime stays responsive while the
//! batch walks through the folder one file at a time.
//!
//! Failures never propagate: an unreadable, encrypted or corrupt PDF yields
//! an empty string plus a warning, and the extraction phase treats it as a
//! per-document failure.

use std::path::Path;
use tracing::{debug, warn};

/// Something that turns a PDF on disk into plain text.
///
/// Implementations must not fail: return `""` (and log) when the document
/// cannot be read.
#[allow(async_fn_in_trait)]
pub trait TextSource {
    async fn extract_text(&self, path: &Path) -> String;
}

/// Production [`TextSource`] backed by pdfium-render.
///
/// The pdfium library is located by `pdfium-auto`: `PDFIUM_LIB_PATH` if set,
/// otherwise a cached download.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumText;

impl TextSource for PdfiumText {
    async fn extract_text(&self, path: &Path) -> String {
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || extract_text_blocking(&owned)).await {
            Ok(Ok(text)) => text,
            Ok(Err(detail)) => {
                warn!("Error extracting text from PDF {}: {}", path.display(), detail);
                String::new()
            }
            Err(e) => {
                warn!("Text extraction task for {} panicked: {}", path.display(), e);
                String::new()
            }
        }
    }
}

/// Concatenate every page's text in page order.
fn extract_text_blocking(path: &Path) -> Result<String, String> {
    let pdfium = pdfium_auto::bind_pdfium_silent().map_err(|e| e.to_string())?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| format!("{:?}", e))?;

    let mut text = String::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| format!("page {}: {:?}", idx + 1, e))?;
        text.push_str(&page_text.all());
    }

    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_pdf_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"this is not a pdf \x00\xff\x13").unwrap();

        assert_eq!(PdfiumText.extract_text(&path).await, "");
    }

    #[tokio::test]
    async fn missing_pdf_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(PdfiumText.extract_text(&dir.path().join("gone.pdf")).await, "");
    }
}
