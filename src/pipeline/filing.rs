//! Filing: submit an expense to the accounting backend, then archive its PDF.
//!
//! ## Ordering
//!
//! The archive folder is computed *before* the submission, so a payload is
//! never accepted without a place to put its PDF. The PDF is moved only
//! after the backend accepted the expense; a rejection leaves it in the
//! input folder for the next run.
//!
//! ```text
//! <archive_root>/<year>/<year> - <month> <company> Taxes/invoices/<filename>
//! ```

use crate::error::{ExpensesError, RecordError};
use crate::model::{split_year_month, ExpensePayload};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where archived invoices go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    root: PathBuf,
    company: String,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>, company: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            company: company.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive folder for an ISO issue date, or `None` if the date has no
    /// usable year and month.
    pub fn location_for_date(&self, date: &str) -> Option<PathBuf> {
        let (year, month) = split_year_month(date)?;
        Some(
            self.root
                .join(year)
                .join(format!("{year} - {month} {} Taxes", self.company))
                .join("invoices"),
        )
    }
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// An accounting backend that accepts expenses.
///
/// `Err` carries the backend's (or transport's) error text.
#[allow(async_fn_in_trait)]
pub trait ExpenseBackend {
    async fn create_expense(&self, payload: &ExpensePayload) -> Result<(), String>;
}

/// Quaderno-style REST backend: `POST <api_url>/expenses`, basic auth with the
/// API key as user and `x` as password.
pub struct QuadernoBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl QuadernoBackend {
    /// # Errors
    /// [`ExpensesError::BackendClient`] if the HTTP client cannot be built.
    pub fn new(api_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ExpensesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExpensesError::BackendClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: expenses_endpoint(api_url),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ExpenseBackend for QuadernoBackend {
    async fn create_expense(&self, payload: &ExpensePayload) -> Result<(), String> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.api_key, Some("x"))
            .json(payload)
            .send()
            .await
            .map_err(|e| format!("HTTP Error: {e}"))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!("Backend answered HTTP {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(match backend_error(&body) {
                Some(msg) => format!("HTTP {status}: {msg}"),
                None => format!("HTTP {status}"),
            });
        }
        match backend_error(&body) {
            Some(msg) => Err(msg),
            None => Ok(()),
        }
    }
}

/// `<api_url>/expenses`, tolerating a trailing slash on the base URL.
fn expenses_endpoint(api_url: &str) -> String {
    format!("{}/expenses", api_url.trim_end_matches('/'))
}

/// The `error` field of a JSON response body, if any.
fn backend_error(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ── Coordinator ──────────────────────────────────────────────────────────────

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filed {
    /// The PDF now lives at this path.
    Archived(PathBuf),
    /// The expense was created but the PDF was gone; the folder was still created.
    SourceMissing { archive_dir: PathBuf },
}

/// Submits payloads and archives their source PDFs.
pub struct FilingCoordinator<'a, B: ExpenseBackend> {
    backend: &'a B,
    layout: &'a ArchiveLayout,
}

impl<'a, B: ExpenseBackend> FilingCoordinator<'a, B> {
    pub fn new(backend: &'a B, layout: &'a ArchiveLayout) -> Self {
        Self { backend, layout }
    }

    /// Submit `payload`; on acceptance move `source` into the archive.
    ///
    /// # Errors
    /// * [`RecordError::InvalidDate`]: no archive folder can be derived; nothing submitted.
    /// * [`RecordError::Rejected`]: backend or transport error; `source` untouched.
    /// * [`RecordError::ArchiveFailed`]: accepted, but the PDF could not be moved.
    pub async fn file(&self, payload: &ExpensePayload, source: &Path) -> Result<Filed, RecordError> {
        let filename = payload.attachment.filename.as_str();
        let archive_dir = payload
            .issue_date
            .as_deref()
            .and_then(|d| self.layout.location_for_date(d))
            .ok_or_else(|| RecordError::InvalidDate {
                filename: filename.to_string(),
                date: payload.issue_date.clone(),
            })?;

        self.backend
            .create_expense(payload)
            .await
            .map_err(|detail| RecordError::Rejected {
                filename: filename.to_string(),
                detail,
            })?;
        info!("Expense for {} created successfully", filename);

        archive_source(source, &archive_dir, filename)
    }
}

/// Create `archive_dir` and move `source` into it.
fn archive_source(source: &Path, archive_dir: &Path, filename: &str) -> Result<Filed, RecordError> {
    let archive_failed = |e: io::Error| RecordError::ArchiveFailed {
        filename: filename.to_string(),
        detail: e.to_string(),
    };

    std::fs::create_dir_all(archive_dir).map_err(archive_failed)?;

    if !source.exists() {
        warn!("Warning: source file not found: {}", source.display());
        return Ok(Filed::SourceMissing {
            archive_dir: archive_dir.to_path_buf(),
        });
    }

    let destination = archive_dir.join(filename);
    move_file(source, &destination).map_err(archive_failed)?;
    info!("Moved {} to {}", filename, archive_dir.display());
    Ok(Filed::Archived(destination))
}

/// Rename, falling back to copy + remove when the archive is on another
/// filesystem.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!("rename failed ({}), copying instead", rename_err);
            std::fs::copy(from, to).map_err(|_| rename_err)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::ContactId;
    use crate::model::{Attachment, Contact};
    use std::sync::Mutex;

    struct FakeBackend {
        reply: Result<(), String>,
        calls: Mutex<usize>,
    }

    impl FakeBackend {
        fn new(reply: Result<(), String>) -> Self {
            Self {
                reply,
                calls: Mutex::new(0),
            }
        }
    }

    impl ExpenseBackend for FakeBackend {
        async fn create_expense(&self, _payload: &ExpensePayload) -> Result<(), String> {
            *self.calls.lock().unwrap() += 1;
            self.reply.clone()
        }
    }

    fn payload(date: Option<&str>) -> ExpensePayload {
        ExpensePayload {
            contact: Contact {
                id: ContactId::Number(1),
                full_name: "Acme".into(),
            },
            issue_date: date.map(str::to_string),
            currency: Some("EUR".into()),
            items: vec![],
            payment_method: "credit_card".into(),
            attachment: Attachment {
                filename: "inv.pdf".into(),
                data: None,
            },
        }
    }

    #[test]
    fn archive_location_layout() {
        let layout = ArchiveLayout::new("/archive", "Acme");
        assert_eq!(
            layout.location_for_date("2024-03-10"),
            Some(PathBuf::from("/archive/2024/2024 - 03 Acme Taxes/invoices"))
        );
        assert_eq!(layout.location_for_date("10/03/2024"), None);
    }

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(expenses_endpoint("https://a.example/api/"), "https://a.example/api/expenses");
        assert_eq!(expenses_endpoint("https://a.example/api"), "https://a.example/api/expenses");
    }

    #[test]
    fn backend_error_detection() {
        assert_eq!(backend_error(r#"{"error":"Unauthorized"}"#), Some("Unauthorized".into()));
        assert_eq!(
            backend_error(r#"{"error":{"contact":["is invalid"]}}"#),
            Some(r#"{"contact":["is invalid"]}"#.into())
        );
        assert_eq!(backend_error(r#"{"id":77,"error":null}"#), None);
        assert_eq!(backend_error(r#"{"id":77}"#), None);
        assert_eq!(backend_error("<html>"), None);
    }

    #[tokio::test]
    async fn accepted_expense_moves_source() {
        let input = tempfile::TempDir::new().unwrap();
        let archive = tempfile::TempDir::new().unwrap();
        let source = input.path().join("inv.pdf");
        std::fs::write(&source, b"%PDF").unwrap();

        let backend = FakeBackend::new(Ok(()));
        let layout = ArchiveLayout::new(archive.path(), "Acme");
        let filed = FilingCoordinator::new(&backend, &layout)
            .file(&payload(Some("2024-03-10")), &source)
            .await
            .unwrap();

        let expected = archive.path().join("2024/2024 - 03 Acme Taxes/invoices/inv.pdf");
        assert_eq!(filed, Filed::Archived(expected.clone()));
        assert!(expected.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn rejected_expense_leaves_source() {
        let input = tempfile::TempDir::new().unwrap();
        let archive = tempfile::TempDir::new().unwrap();
        let source = input.path().join("inv.pdf");
        std::fs::write(&source, b"%PDF").unwrap();

        let backend = FakeBackend::new(Err("HTTP 422".into()));
        let layout = ArchiveLayout::new(archive.path(), "Acme");
        let err = FilingCoordinator::new(&backend, &layout)
            .file(&payload(Some("2024-03-10")), &source)
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::Rejected { ref detail, .. } if detail == "HTTP 422"));
        assert!(source.exists());
        assert!(!archive.path().join("2024").exists());
    }

    #[tokio::test]
    async fn bad_date_is_never_submitted() {
        let archive = tempfile::TempDir::new().unwrap();
        let backend = FakeBackend::new(Ok(()));
        let layout = ArchiveLayout::new(archive.path(), "Acme");
        let err = FilingCoordinator::new(&backend, &layout)
            .file(&payload(None), Path::new("/nowhere/inv.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::InvalidDate { .. }));
        assert_eq!(*backend.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn vanished_source_is_a_warning() {
        let input = tempfile::TempDir::new().unwrap();
        let archive = tempfile::TempDir::new().unwrap();
        let backend = FakeBackend::new(Ok(()));
        let layout = ArchiveLayout::new(archive.path(), "Acme");
        let filed = FilingCoordinator::new(&backend, &layout)
            .file(&payload(Some("2024-11-02")), &input.path().join("inv.pdf"))
            .await
            .unwrap();

        let dir = archive.path().join("2024/2024 - 11 Acme Taxes/invoices");
        assert_eq!(filed, Filed::SourceMissing { archive_dir: dir.clone() });
        assert!(dir.is_dir());
    }
}
