//! OpenAI-style `/chat/completions` endpoints.
//!
//! Serves OpenAI models directly and Gemini models through Google's
//! compatibility layer. The two differ only in base URL, key and registry
//! name, so one provider type carries a [`ProviderKind`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::factory::ProviderFactory;
use super::http::{post_json, validate_endpoint_config};
use super::routing::ProviderKind;
use super::secrets::{ApiCredential, CredentialSource};
use super::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Gemini => GEMINI_BASE_URL,
        _ => OPENAI_BASE_URL,
    }
}

pub struct OpenAiProvider {
    kind: ProviderKind,
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("kind", &self.kind)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// OpenAI with an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let kind = ProviderKind::OpenAi;
        Self::from_credential(
            kind,
            ApiCredential::new(api_key, CredentialSource::Programmatic, kind.credential_label()),
        )
    }

    /// Key from `config.api_key` or the kind's environment variable;
    /// optional `config.base_url`.
    pub fn from_config(kind: ProviderKind, config: &JsonValue) -> Result<Self, ProviderError> {
        let provider = Self::from_credential(kind, ApiCredential::resolve(kind, config)?);
        Ok(match config["base_url"].as_str() {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    fn from_credential(kind: ProviderKind, credential: ApiCredential) -> Self {
        Self {
            kind,
            credential,
            base_url: default_base_url(kind).to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ChatReply {
    /// First choice as a response; the requested model fills in when the API omits it.
    fn into_response(self, requested_model: &str) -> Result<CompletionResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("reply has no choices".to_string()))?;
        let usage = self.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            stop_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = ChatRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose());

        let reply: ChatReply = post_json(request, &body, config.timeout).await?;
        reply.into_response(&config.model)
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        self.kind.provider_type()
    }
}

/// Registry entry for `openai` or `gemini`.
///
/// Config: `{"api_key": "...", "base_url": "..."}`, both optional; the key
/// falls back to `OPENAI_API_KEY` or `GEMINI_API_KEY`.
pub struct OpenAiProviderFactory {
    kind: ProviderKind,
}

impl OpenAiProviderFactory {
    pub fn openai() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
        }
    }

    pub fn gemini() -> Self {
        Self {
            kind: ProviderKind::Gemini,
        }
    }
}

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        self.kind.provider_type()
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OpenAiProvider::from_config(self.kind, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        validate_endpoint_config(self.kind, config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": default_base_url(self.kind) })
    }

    fn description(&self) -> &'static str {
        match self.kind {
            ProviderKind::Gemini => "Gemini via OpenAI-compatible chat completions",
            _ => "OpenAI chat completions",
        }
    }
}
