//! Anthropic messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::factory::ProviderFactory;
use super::http::{post_json, validate_endpoint_config};
use super::routing::ProviderKind;
use super::secrets::{ApiCredential, CredentialSource};
use super::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, Role,
    TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Claude models over `POST /v1/messages`.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            ProviderKind::Anthropic.credential_label(),
        ))
    }

    /// Key from `config.api_key` or the environment; optional `config.base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let provider =
            Self::from_credential(ApiCredential::resolve(ProviderKind::Anthropic, config)?);
        Ok(match config["base_url"].as_str() {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    fn from_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// System turns go in the top-level `system` field; the rest stay in order.
fn messages_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> MessagesRequest<'_> {
    let (system, turns): (Vec<ChatMessage>, Vec<ChatMessage>) = messages
        .into_iter()
        .partition(|m| m.role == Role::System);

    let system = (!system.is_empty()).then(|| {
        system
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n\n")
    });

    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system,
        messages: turns,
    }
}

impl From<MessagesResponse> for CompletionResponse {
    fn from(body: MessagesResponse) -> Self {
        CompletionResponse {
            content: body.content.into_iter().filter_map(|b| b.text).collect(),
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION);

        let body: MessagesResponse =
            post_json(request, &messages_request(messages, config), config.timeout).await?;
        Ok(body.into())
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        ProviderKind::Anthropic.provider_type()
    }
}

/// Registry entry for `anthropic`.
///
/// Config: `{"api_key": "...", "base_url": "..."}`, both optional; the key
/// falls back to `ANTHROPIC_API_KEY`.
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        ProviderKind::Anthropic.provider_type()
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        validate_endpoint_config(ProviderKind::Anthropic, config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": DEFAULT_BASE_URL })
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude messages API"
    }
}
