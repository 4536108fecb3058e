//! Prompts for LLM-based invoice extraction.
//!
//! The system instruction is fixed and lives here. The user prompt is a
//! template file owned by the deployment (`prompt.txt`, created from
//! `prompt.txt.example`) so the requested fields can be tuned without a
//! rebuild; it must contain [`TEXT_PLACEHOLDER`] where the invoice text goes.

use crate::error::ExpensesError;
use std::path::Path;
use tracing::{debug, warn};

/// System instruction sent with every extraction request.
pub const SYSTEM_PROMPT: &str =
    "You are a utility which extracts accurate, structured JSON data from PDF invoices.";

/// Placeholder in the prompt template replaced by the invoice text.
pub const TEXT_PLACEHOLDER: &str = "{TEXT_TO_PARSE}";

/// A loaded user-prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Wrap an in-memory template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Read the template file.
    ///
    /// # Errors
    /// [`ExpensesError::PromptMissing`] if the file does not exist or cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExpensesError> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|_| ExpensesError::PromptMissing {
            path: path.to_path_buf(),
        })?;

        if !template.contains(TEXT_PLACEHOLDER) {
            warn!(
                "Prompt template {} has no {} placeholder; invoice text will not be sent",
                path.display(),
                TEXT_PLACEHOLDER
            );
        }
        debug!("Loaded prompt template from {}", path.display());
        Ok(Self::new(template))
    }

    /// Substitute every placeholder occurrence with `text`.
    pub fn render(&self, text: &str) -> String {
        self.template.replace(TEXT_PLACEHOLDER, text)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}
