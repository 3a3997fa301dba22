//! Test doubles shared by the runtime's unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, CredentialCheck, LlmProvider,
    ProviderError,
};

/// A recorded provider call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub config: CompletionConfig,
}

/// Replies from a script, then falls back to a fixed reply (or an error).
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn script(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::script(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::script(Vec::new())
        }
    }

    pub fn failing() -> Self {
        Self::script(Vec::new())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.lock().push(RecordedCall {
            messages,
            config: config.clone(),
        });

        let next = self.script.lock().pop_front();
        let content = match (next, &self.fallback) {
            (Some(result), _) => result?,
            (None, Some(reply)) => reply.clone(),
            (None, None) => {
                return Err(ProviderError::ApiError {
                    status: 503,
                    message: "service unavailable".to_string(),
                })
            }
        };

        Ok(CompletionResponse::text(content, config.model.clone()))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sleeps before replying; used with paused tokio time.
pub struct SlowProvider {
    delay: Duration,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LlmProvider for SlowProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(CompletionResponse::text("answer: [A]", config.model.clone()))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "slow"
    }
}

pub struct AllowAll;

impl CredentialCheck for AllowAll {
    fn check(&self, _model: &str) -> Result<(), String> {
        Ok(())
    }
}

pub struct DenyAll;

impl CredentialCheck for DenyAll {
    fn check(&self, model: &str) -> Result<(), String> {
        Err(format!("No API keys found for model {}", model))
    }
}
