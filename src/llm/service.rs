use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::openai::OpenAiProvider;
use super::output::parse_json_output;
use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

const NOT_CONFIGURED: &str =
    "LLM not configured. Set OPENAI_API_KEY or llm.api_key / llm.base_url in config.yml.";

#[derive(Clone)]
struct ActiveModel {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
}

/// Chat access to the configured generative model.
///
/// Holds no provider while unconfigured; every call then fails with
/// `ServiceUnavailable` instead of reaching the network.
#[derive(Clone)]
pub struct LlmService {
    active: Arc<RwLock<Option<ActiveModel>>>,
}

impl LlmService {
    pub fn new(settings: &LlmSettings) -> Result<Self, ApiError> {
        Ok(Self {
            active: Arc::new(RwLock::new(Self::build(settings)?)),
        })
    }

    /// Service backed by an explicit provider.
    pub fn with_provider(provider: Arc<dyn LlmProvider>, settings: &LlmSettings) -> Self {
        Self {
            active: Arc::new(RwLock::new(Some(ActiveModel {
                provider,
                model: settings.model.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            }))),
        }
    }

    fn build(settings: &LlmSettings) -> Result<Option<ActiveModel>, ApiError> {
        if !settings.is_configured() {
            tracing::warn!("{}", NOT_CONFIGURED);
            return Ok(None);
        }

        let provider = OpenAiProvider::new(settings)?;
        tracing::info!(
            base_url = %settings.base_url,
            model = %settings.model,
            "LLM provider configured"
        );
        Ok(Some(ActiveModel {
            provider: Arc::new(provider),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }))
    }

    /// Rebuilds the provider after a configuration change.
    pub async fn reload(&self, settings: &LlmSettings) -> Result<(), ApiError> {
        let next = Self::build(settings)?;
        *self.active.write().await = next;
        Ok(())
    }

    pub async fn is_configured(&self) -> bool {
        self.active.read().await.is_some()
    }

    async fn current(&self) -> Result<ActiveModel, ApiError> {
        self.active
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::ServiceUnavailable(NOT_CONFIGURED.to_string()))
    }

    /// Raw completion text.
    pub async fn chat_text(&self, mut request: ChatRequest) -> Result<String, ApiError> {
        let active = self.current().await?;
        if request.temperature.is_none() {
            request.temperature = Some(active.temperature);
        }
        if request.max_tokens.is_none() {
            request.max_tokens = active.max_tokens;
        }

        tracing::debug!(
            provider = active.provider.name(),
            model = %active.model,
            messages = request.messages.len(),
            "Sending chat request"
        );
        active.provider.chat(request, &active.model).await
    }

    /// Completion parsed as a JSON value.
    pub async fn chat_json(&self, request: ChatRequest) -> Result<Value, ApiError> {
        let text = self.chat_text(request).await?;
        parse_json_output(&text)
    }
}
