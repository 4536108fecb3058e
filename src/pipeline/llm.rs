//! LLM interaction: turn invoice text into an [`ExtractedRecord`].
//!
//! One chat request per document: the fixed system instruction, then the
//! rendered prompt template as the user turn, sampled at temperature 0. The
//! reply must be a JSON object. There is no retry: a failed call or an
//! unparseable reply logs the cause and the document is left out of the
//! batch output.

use crate::config::PipelineConfig;
use crate::error::ExpensesError;
use crate::model::ExtractedRecord;
use crate::pipeline::clean::strip_code_fences;
use crate::prompts::{PromptTemplate, SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse, ProviderFactory};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Extraction is deterministic: identical invoices give identical records.
const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Something that turns invoice text into a structured record.
///
/// `None` means "no record": the failure has already been logged.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    async fn extract_record(&self, filename: &str, text: &str) -> Option<ExtractedRecord>;
}

/// Production [`RecordSource`] backed by an edgequake-llm provider.
pub struct StructuredExtractor {
    provider: Arc<dyn LLMProvider>,
    template: PromptTemplate,
    max_tokens: usize,
}

impl StructuredExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, template: PromptTemplate, config: &PipelineConfig) -> Self {
        Self {
            provider,
            template,
            max_tokens: config.max_tokens,
        }
    }

    /// Build the request messages for one document.
    fn messages(&self, text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(self.template.render(text)),
        ]
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(EXTRACTION_TEMPERATURE),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl RecordSource for StructuredExtractor {
    async fn extract_record(&self, filename: &str, text: &str) -> Option<ExtractedRecord> {
        let start = Instant::now();
        let messages = self.messages(text);
        let options = self.options();

        let result = self.provider.chat(&messages, Some(&options)).await;
        debug!("{}: model call took {:?}", filename, start.elapsed());
        record_from_response(filename, result)
    }
}

/// One provider outcome → record. A provider error is logged, never retried.
fn record_from_response(
    filename: &str,
    result: edgequake_llm::Result<LLMResponse>,
) -> Option<ExtractedRecord> {
    match result {
        Ok(response) => {
            debug!(
                "{}: {} input tokens, {} output tokens",
                filename, response.prompt_tokens, response.completion_tokens
            );
            parse_reply(filename, &response.content)
        }
        Err(e) => {
            warn!("{}: an error occurred with the LLM provider: {}", filename, e);
            None
        }
    }
}

/// Parse a model reply into a record.
///
/// Accepts a JSON object, optionally wrapped in one Markdown code fence. Any
/// `filename` key the model invented is dropped; the caller tags the record
/// with the real one.
pub fn parse_reply(filename: &str, reply: &str) -> Option<ExtractedRecord> {
    let body = strip_code_fences(reply);
    let mut map = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("{}: model reply is JSON but not an object", filename);
            warn!("{}: AI response: {}", filename, reply);
            return None;
        }
        Err(e) => {
            warn!("{}: failed to decode JSON reply ({})", filename, e);
            warn!("{}: AI response: {}", filename, reply);
            return None;
        }
    };
    map.remove("filename");

    match serde_json::from_value::<ExtractedRecord>(Value::Object(map)) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("{}: reply does not fit an expense record: {}", filename, e);
            None
        }
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExpensesError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExpensesError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ExpensesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExpensesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
