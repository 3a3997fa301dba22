//! Model access for the scoring engine.
//!
//! The engine sees a single trait, [`LlmProvider`]. Built-in implementations
//! cover the Anthropic messages API and any OpenAI-style `/chat/completions`
//! endpoint (OpenAI itself and Gemini's compatibility layer); each sits behind
//! a cargo feature so library users only pull `reqwest` when they want it.
//!
//! Which provider serves a model, and which key it needs, is decided by
//! [`routing`]. Keys are wrapped by [`secrets`] and never printed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod routing;
pub mod secrets;

#[cfg(any(feature = "anthropic", feature = "openai"))]
mod http;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use routing::{route_model, CredentialCheck, EnvCredentials, ModelRoute, ProviderKind};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory};

/// Why a completion could not be obtained.
///
/// The scoring engine never surfaces these from `score`; they only appear in
/// warnings, in a [`ScoreReport`](crate::ScoreReport), or wrapped in a
/// build-time [`ConfigurationError`](crate::ConfigurationError).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limited by provider (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unreadable provider response: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Per-call settings, fixed when the engine is built.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model name as the provider API expects it
    pub model: String,

    pub max_tokens: u32,

    /// Sampling temperature, always sent explicitly
    pub temperature: f32,

    /// Deadline for one call
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        let engine = crate::config::EngineConfig::default();
        Self {
            model: engine.model,
            max_tokens: engine.max_tokens,
            temperature: engine.temperature,
            timeout: engine.timeout,
        }
    }
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Reflection prompts are sent as a single user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Text returned by a provider, with accounting metadata.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,

    /// Model that actually answered, as reported by the API
    pub model: String,

    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// A response carrying only text.
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            model: model.into(),
            stop_reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A chat-completion backend.
///
/// Implementations report failures as [`ProviderError`] and leave retries,
/// deadlines and fallbacks to the caller.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Cheap local readiness check; makes no network call.
    async fn health_check(&self) -> bool;

    /// Short name used in logs, e.g. "openai".
    fn name(&self) -> &str;
}
