//! Input enumeration: list the PDF invoices waiting in the input folder.
//!
//! Only regular files whose extension is `pdf` (any case) count; sub-folders
//! and other attachments are ignored. Results are sorted by filename so two
//! runs over the same folder produce the same store order.

use crate::error::ExpensesError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A PDF invoice in the input folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name relative to the input folder; the key used in the store.
    pub filename: String,
    pub path: PathBuf,
}

/// Check whether a path has a `.pdf` extension.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// List the PDF documents in `dir`, sorted by filename.
///
/// # Errors
/// [`ExpensesError::InputDirUnreadable`] if the folder cannot be listed.
pub fn list_documents(dir: &Path) -> Result<Vec<SourceDocument>, ExpensesError> {
    let unreadable = |source| ExpensesError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut docs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if !path.is_file() || !is_pdf(&path) {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            debug!("Skipping non-UTF-8 file name: {}", path.display());
            continue;
        };
        docs.push(SourceDocument { filename, path });
    }

    docs.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!("Found {} PDF documents in {}", docs.len(), dir.display());
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("/tmp/a.pdf")));
        assert!(is_pdf(Path::new("INVOICE.PDF")));
        assert!(!is_pdf(Path::new("a.pdf.txt")));
        assert!(!is_pdf(Path::new("pdf")));
        assert!(!is_pdf(Path::new("")));
    }

    #[test]
    fn lists_only_pdfs_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let docs = list_documents(dir.path()).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
        assert_eq!(docs[1].path, dir.path().join("b.pdf"));
    }

    #[test]
    fn missing_dir_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = list_documents(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ExpensesError::InputDirUnreadable { .. }));
    }
}
