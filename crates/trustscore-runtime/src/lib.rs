//! # trustscore-runtime
//!
//! LLM-backed self-reflection certainty scoring.
//!
//! The pure pieces (prompt rendering, reply parsing, score arithmetic) live in
//! `trustscore-core`. This crate adds everything that talks to a model: the
//! provider abstraction, the judgment cache, configuration, and the
//! [`ScoringEngine`] that ties them together.
//!
//! ## Failure policy
//!
//! Configuration problems (missing credential, malformed prompt template,
//! unroutable model) fail when the engine is built. Once built, scoring never
//! fails: a provider error or timeout turns into an `Unsure` judgment worth
//! 0.5 and a logged warning.
//!
//! ## Example
//!
//! ```rust,ignore
//! use trustscore_runtime::ScoringEngine;
//!
//! let engine = ScoringEngine::builder()
//!     .model("gpt-4")
//!     .temperature(0.0)
//!     .build()?;
//!
//! let score = engine.score("What is 2+2?", "4").await;
//! assert!(score.value() >= 0.0 && score.value() <= 1.0);
//! ```

use thiserror::Error;

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod providers;

#[cfg(test)]
mod testing;

pub use batch::BatchRunner;
pub use cache::JudgmentCache;
pub use config::{EngineConfig, DEFAULT_MODEL};
pub use engine::{JudgmentSource, PromptOutcome, ScoreReport, ScoringEngine, ScoringEngineBuilder};
pub use providers::{
    route_model, ApiCredential, ChatMessage, CompletionConfig, CompletionResponse,
    CredentialCheck, EnvCredentials, LlmProvider, ModelRoute, ProviderError, ProviderFactory,
    ProviderKind, ProviderRegistry, Role,
};
pub use trustscore_core::{
    CacheKey, Judgment, PromptSetError, ReflectionPrompt, ReflectionPromptSet, TemplateError,
    TrustScore,
};

/// Errors raised while building a scoring engine.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("API key error: {0}")]
    MissingCredential(String),

    #[error("Invalid reflection prompts: {0}")]
    InvalidPromptSet(#[from] PromptSetError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Score one question/answer pair with a fresh engine.
///
/// Settings come from [`EngineConfig::from_env`]; `model` overrides the
/// configured model. Each call builds its own engine, so nothing is cached
/// between calls. Hold a [`ScoringEngine`] to reuse judgments.
pub async fn evaluate_trustworthiness(
    question: &str,
    answer: &str,
    model: Option<&str>,
) -> Result<TrustScore, ConfigurationError> {
    let config = EngineConfig::from_env()?;
    evaluate_with(ScoringEngine::builder(), config, question, answer, model).await
}

/// Apply the model override to `config`, build on top of `builder` and score once.
async fn evaluate_with(
    builder: ScoringEngineBuilder,
    mut config: EngineConfig,
    question: &str,
    answer: &str,
    model: Option<&str>,
) -> Result<TrustScore, ConfigurationError> {
    if let Some(model) = model {
        config.model = model.to_string();
    }

    let engine = builder.config(config).build()?;
    Ok(engine.score(question, answer).await)
}
