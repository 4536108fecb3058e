//! Category → vendor/accounting metadata lookup.
//!
//! The mapping is read once from a TOML file and frozen: [`CategoryResolver`]
//! has no mutating methods. Labels are matched case-sensitively; an unknown
//! label is an ordinary `None`, and callers skip the record with a warning.
//!
//! ```toml
//! [vendors.software]
//! contact_id = 12345
//! contact_full_name = "Acme Software SL"
//! item_description = "Software subscription"
//! payment_method = "credit_card"
//! ```

use crate::error::ExpensesError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Contact identifier in the accounting backend.
///
/// Kept as written in the mapping file so it is posted back with the same
/// JSON type (number or string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactId::Number(n) => write!(f, "{n}"),
            ContactId::Text(s) => f.write_str(s),
        }
    }
}

/// Accounting metadata for one category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryDetails {
    pub contact_id: ContactId,
    pub contact_full_name: String,
    pub item_description: String,
    pub payment_method: String,
}

#[derive(Deserialize)]
struct MappingFile {
    #[serde(default)]
    vendors: HashMap<String, CategoryDetails>,
}

/// Immutable category label → [`CategoryDetails`] map.
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    vendors: HashMap<String, CategoryDetails>,
}

impl CategoryResolver {
    /// Load the mapping file.
    ///
    /// # Errors
    /// * [`ExpensesError::CategoryConfigMissing`] when the file does not exist.
    /// * [`ExpensesError::CategoryConfigInvalid`] when it cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExpensesError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ExpensesError::CategoryConfigMissing {
                path: path.to_path_buf(),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|e| ExpensesError::CategoryConfigInvalid {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let resolver = Self::from_toml_str(&raw).map_err(|e| ExpensesError::CategoryConfigInvalid {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        info!(
            "Loaded {} categories from {}",
            resolver.len(),
            path.display()
        );
        Ok(resolver)
    }

    /// Parse a mapping document already in memory.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        let file: MappingFile = toml::from_str(raw)?;
        Ok(Self {
            vendors: file.vendors,
        })
    }

    /// Build a resolver from explicit entries.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CategoryDetails)>,
        K: Into<String>,
    {
        Self {
            vendors: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a category label.
    pub fn resolve(&self, label: &str) -> Option<&CategoryDetails> {
        self.vendors.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.vendors.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    /// Known labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.vendors.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}
