//! Configuration for the extraction and filing phases.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. Settings that only the filing phase needs
//! (archive root, company name, backend credentials) are optional here and
//! checked when that phase starts, so `extract` can run with just an input
//! folder and an LLM key.

use crate::error::ExpensesError;
use crate::pipeline::filing::ArchiveLayout;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Configuration shared by both pipeline phases.
///
/// # Example
/// ```rust
/// use edgequake_expenses::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_dir("/home/me/Email Attachments")
///     .store_root("/home/me/taxes")
///     .archive_root("/home/me/Dropbox/Taxes")
///     .company_name("Acme")
///     .build()
///     .unwrap();
/// assert!(config.store_path().ends_with("temp/expenses.json"));
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Folder watched for incoming PDF invoices.
    pub input_dir: PathBuf,

    /// Root of the dated archive tree. Required for filing.
    pub archive_root: Option<PathBuf>,

    /// Company display name used in archive folder names. Required for filing.
    pub company_name: Option<String>,

    /// Working root: the store lives in `<store_root>/temp/` and the prompt
    /// template defaults to `<store_root>/prompt.txt`. Default: `.`.
    pub store_root: PathBuf,

    /// Accounting backend base URL, e.g. `https://acme.quadernoapp.com/api/`.
    pub api_url: Option<String>,

    /// Accounting backend API key (basic-auth user).
    pub api_key: Option<String>,

    /// Category mapping file. Default: `config/category_mappings.toml`.
    pub category_config: PathBuf,

    /// Prompt template path. If None, `<store_root>/prompt.txt`.
    pub prompt_path: Option<PathBuf>,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens the model may generate per invoice. Default: 1024.
    pub max_tokens: usize,

    /// HTTP timeout for accounting-backend calls in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            archive_root: None,
            company_name: None,
            store_root: PathBuf::from("."),
            api_url: None,
            api_key: None,
            category_config: PathBuf::from("config/category_mappings.toml"),
            prompt_path: None,
            model: None,
            provider_name: None,
            provider: None,
            max_tokens: 1024,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("archive_root", &self.archive_root)
            .field("company_name", &self.company_name)
            .field("store_root", &self.store_root)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("category_config", &self.category_config)
            .field("prompt_path", &self.prompt_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Location of the intermediate store: `<store_root>/temp/expenses.json`.
    pub fn store_path(&self) -> PathBuf {
        self.store_root.join("temp").join("expenses.json")
    }

    /// Location of the prompt template.
    pub fn prompt_file(&self) -> PathBuf {
        self.prompt_path
            .clone()
            .unwrap_or_else(|| self.store_root.join("prompt.txt"))
    }

    /// Model to request from the provider.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Path of a source document inside the input folder.
    pub fn source_path(&self, filename: &str) -> PathBuf {
        self.input_dir.join(filename)
    }

    /// Archive layout for the filing phase.
    ///
    /// # Errors
    /// [`ExpensesError::InvalidConfig`] when the archive root or company name is unset.
    pub fn archive_layout(&self) -> Result<ArchiveLayout, ExpensesError> {
        let root = self
            .archive_root
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| missing("archive root (DROPBOX_FOLDER)"))?;
        let company = self
            .company_name
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| missing("company name (COMPANY_NAME)"))?;
        Ok(ArchiveLayout::new(root, company))
    }

    /// Accounting backend `(url, api_key)`.
    ///
    /// # Errors
    /// [`ExpensesError::InvalidConfig`] when either value is unset.
    pub fn backend_credentials(&self) -> Result<(&str, &str), ExpensesError> {
        let url = self
            .api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing("accounting API URL (QUADERNO_API_URL)"))?;
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing("accounting API key (QUADERNO_API_KEY)"))?;
        Ok((url, key))
    }
}

fn missing(what: &str) -> ExpensesError {
    ExpensesError::InvalidConfig(format!("{what} is required for filing but not set"))
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.input_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn archive_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.archive_root = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn company_name(mut self, name: impl Into<String>) -> Self {
        self.config.company_name = Some(name.into());
        self
    }

    pub fn store_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.store_root = dir.as_ref().to_path_buf();
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn category_config(mut self, path: impl AsRef<Path>) -> Self {
        self.config.category_config = path.as_ref().to_path_buf();
        self
    }

    pub fn prompt_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.prompt_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ExpensesError> {
        let c = &self.config;
        if c.input_dir.as_os_str().is_empty() {
            return Err(ExpensesError::InvalidConfig(
                "input folder (EMAIL_ATTACHMENTS_FOLDER) must be set".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExpensesError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PipelineConfigBuilder {
        PipelineConfig::builder().input_dir("/in")
    }

    #[test]
    fn defaults() {
        let c = base().build().unwrap();
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(c.store_path(), PathBuf::from("./temp/expenses.json"));
        assert_eq!(c.prompt_file(), PathBuf::from("./prompt.txt"));
        assert_eq!(c.category_config, PathBuf::from("config/category_mappings.toml"));
    }

    #[test]
    fn input_dir_is_required() {
        let err = PipelineConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("EMAIL_ATTACHMENTS_FOLDER"));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(base().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn explicit_prompt_path_wins() {
        let c = base().store_root("/work").prompt_path("/etc/prompt.txt").build().unwrap();
        assert_eq!(c.prompt_file(), PathBuf::from("/etc/prompt.txt"));
        assert_eq!(c.store_path(), PathBuf::from("/work/temp/expenses.json"));
    }

    #[test]
    fn filing_settings_checked_lazily() {
        let c = base().build().unwrap();
        let err = c.archive_layout().unwrap_err();
        assert!(err.to_string().contains("DROPBOX_FOLDER"));
        let err = c.backend_credentials().unwrap_err();
        assert!(err.to_string().contains("QUADERNO_API_URL"));

        let c = base()
            .archive_root("/archive")
            .company_name("   ")
            .build()
            .unwrap();
        assert!(c.archive_layout().unwrap_err().to_string().contains("COMPANY_NAME"));
    }

    #[test]
    fn debug_redacts_key() {
        let c = base().api_key("sk_live_secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk_live_secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
