//! Scoring engine: self-reflection queries in, trust score out.
//!
//! For each reflection prompt, in order, the engine renders the prompt with
//! the question and answer, reuses a cached judgment if one exists, and
//! otherwise asks the provider and parses the reply. The score is the mean
//! of the judgment values.
//!
//! # Failure policy
//! Provider errors and timeouts never reach the caller of [`ScoringEngine::score`].
//! The affected prompt contributes an `Unsure` judgment (0.5), which is
//! cached like a parsed one, and a warning is logged. Only misconfiguration fails, and only at build time.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

use trustscore_core::{CacheKey, Judgment, ReflectionPromptSet, ResponseParser, TrustScore};

use crate::batch::BatchRunner;
use crate::cache::JudgmentCache;
use crate::config::EngineConfig;
use crate::providers::{
    route_model, ChatMessage, CompletionConfig, CredentialCheck, EnvCredentials, LlmProvider,
    ProviderError, ProviderRegistry,
};
use crate::ConfigurationError;

/// Where a prompt's judgment came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JudgmentSource {
    /// Reused from the engine's cache
    Cache,

    /// Parsed from a fresh model reply
    Model,

    /// Provider call failed; judgment substituted as unsure
    Fallback { reason: String },
}

/// Result of one reflection prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptOutcome {
    /// Position in the prompt set
    pub index: usize,

    /// The judgment that entered the score
    pub judgment: Judgment,

    /// How the judgment was obtained
    pub source: JudgmentSource,
}

/// A score together with its per-prompt breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub score: TrustScore,
    pub outcomes: Vec<PromptOutcome>,
}

impl ScoreReport {
    /// Number of prompts answered by a substituted judgment.
    pub fn fallback_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.source, JudgmentSource::Fallback { .. }))
            .count()
    }
}

/// Estimates answer trustworthiness by asking a model to judge its own answer.
///
/// One engine is one (model, prompt set, temperature) combination and owns
/// the only cache valid for that combination.
pub struct ScoringEngine {
    provider: Arc<dyn LlmProvider>,
    model: String,
    completion: CompletionConfig,
    prompts: ReflectionPromptSet,
    cache: JudgmentCache,
    parser: ResponseParser,
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.completion.temperature)
            .field("prompts", &self.prompts.len())
            .field("cache", &self.cache)
            .finish()
    }
}

impl ScoringEngine {
    /// Start building an engine.
    pub fn builder() -> ScoringEngineBuilder {
        ScoringEngineBuilder::new()
    }

    /// Score a question/answer pair. Never fails.
    pub async fn score(&self, question: &str, answer: &str) -> TrustScore {
        self.score_detailed(question, answer).await.score
    }

    /// Score a pair and report how each prompt was judged.
    pub async fn score_detailed(&self, question: &str, answer: &str) -> ScoreReport {
        let mut outcomes = Vec::with_capacity(self.prompts.len());

        for (index, prompt) in self.prompts.iter() {
            let key = CacheKey::new(question, answer, index);

            if let Some(judgment) = self.cache.lookup(&key).await {
                tracing::debug!(prompt_index = index, %judgment, "Reusing cached judgment");
                outcomes.push(PromptOutcome {
                    index,
                    judgment,
                    source: JudgmentSource::Cache,
                });
                continue;
            }

            let rendered = prompt.render(question, answer);
            let outcome = match self.query(rendered).await {
                Ok(text) => {
                    let judgment = self.parser.parse(&text);
                    self.cache.store(key, judgment).await;
                    PromptOutcome {
                        index,
                        judgment,
                        source: JudgmentSource::Model,
                    }
                }
                Err(e) => {
                    // Cached like any other judgment; failed prompts are not retried
                    tracing::warn!(
                        model = %self.model,
                        provider = self.provider.name(),
                        prompt_index = index,
                        error = %e,
                        "Reflection query failed, counting prompt as unsure"
                    );
                    self.cache.store(key, Judgment::Unsure).await;
                    PromptOutcome {
                        index,
                        judgment: Judgment::Unsure,
                        source: JudgmentSource::Fallback {
                            reason: e.to_string(),
                        },
                    }
                }
            };
            outcomes.push(outcome);
        }

        let judgments: Vec<Judgment> = outcomes.iter().map(|o| o.judgment).collect();
        let score = TrustScore::from_judgments(&judgments)
            .expect("reflection prompt set is never empty");

        ScoreReport { score, outcomes }
    }

    /// Score every pair in order. See [`BatchRunner`] for progress reporting.
    pub async fn evaluate_all<Q, A>(&self, pairs: &[(Q, A)]) -> Vec<TrustScore>
    where
        Q: AsRef<str>,
        A: AsRef<str>,
    {
        BatchRunner::new(self).evaluate_all(pairs).await
    }

    /// Drop every cached judgment. No-op when caching is disabled.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Model identifier this engine was built for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sampling temperature sent with every call.
    pub fn temperature(&self) -> f32 {
        self.completion.temperature
    }

    /// Per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.completion.timeout
    }

    /// The active reflection prompts.
    pub fn prompts(&self) -> &ReflectionPromptSet {
        &self.prompts
    }

    /// The engine's judgment cache.
    pub fn cache(&self) -> &JudgmentCache {
        &self.cache
    }

    async fn query(&self, prompt: String) -> Result<String, ProviderError> {
        let call = self
            .provider
            .complete(vec![ChatMessage::user(prompt)], &self.completion);

        match tokio::time::timeout(self.completion.timeout, call).await {
            Ok(result) => result.map(|response| response.content),
            Err(_) => Err(ProviderError::Timeout(self.completion.timeout)),
        }
    }
}

enum PromptChoice {
    Default,
    Set(ReflectionPromptSet),
    Templates(Vec<String>),
}

/// Builder for [`ScoringEngine`].
pub struct ScoringEngineBuilder {
    config: EngineConfig,
    prompts: PromptChoice,
    provider: Option<Arc<dyn LlmProvider>>,
    provider_config: JsonValue,
    credentials: Option<Arc<dyn CredentialCheck>>,
    registry: Option<ProviderRegistry>,
}

impl ScoringEngineBuilder {
    /// Create a builder with [`EngineConfig::default`] and the default prompts.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            prompts: PromptChoice::Default,
            provider: None,
            provider_config: serde_json::json!({}),
            credentials: None,
            registry: None,
        }
    }

    /// Replace every config field at once.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Enable or disable judgment caching.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum reply length.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Use a validated prompt set.
    pub fn prompts(mut self, prompts: ReflectionPromptSet) -> Self {
        self.prompts = PromptChoice::Set(prompts);
        self
    }

    /// Use raw templates; they are validated by [`build`](Self::build).
    pub fn prompt_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prompts = PromptChoice::Templates(templates.into_iter().map(Into::into).collect());
        self
    }

    /// Use this provider instead of resolving one from the model identifier.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// JSON config for the resolved provider (`api_key`, `base_url`).
    pub fn provider_config(mut self, config: JsonValue) -> Self {
        self.provider_config = config;
        self
    }

    /// Replace the credential check (defaults to [`EnvCredentials`]).
    pub fn credentials(mut self, credentials: Arc<dyn CredentialCheck>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Registry used to resolve a provider (defaults to [`ProviderRegistry::with_defaults`]).
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate everything and build the engine.
    ///
    /// Fails if the config is out of range, no credential exists for the
    /// model, the prompt set is empty or malformed, or no provider can be
    /// resolved.
    pub fn build(self) -> Result<ScoringEngine, ConfigurationError> {
        self.config.validate()?;
        let model = self.config.model.clone();

        let credentials: Arc<dyn CredentialCheck> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(EnvCredentials::with_config(self.provider_config.clone())),
        };
        credentials
            .check(&model)
            .map_err(ConfigurationError::MissingCredential)?;

        let prompts = match self.prompts {
            PromptChoice::Default => ReflectionPromptSet::default(),
            PromptChoice::Set(set) => set,
            PromptChoice::Templates(templates) => ReflectionPromptSet::new(templates)?,
        };

        // An explicit provider gets the identifier verbatim; a routed one gets
        // the name its API expects.
        let (provider, api_model) = match self.provider {
            Some(provider) => (provider, model.clone()),
            None => {
                let registry = self.registry.unwrap_or_else(ProviderRegistry::with_defaults);
                let provider = registry.create_for_model(&model, &self.provider_config)?;
                let api_model = route_model(&model)
                    .map(|route| route.api_model)
                    .unwrap_or_else(|| model.clone());
                (provider, api_model)
            }
        };

        tracing::info!(
            model = %model,
            provider = provider.name(),
            prompts = prompts.len(),
            temperature = self.config.temperature,
            cache_enabled = self.config.cache_enabled,
            "Scoring engine ready"
        );

        Ok(ScoringEngine {
            provider,
            model,
            completion: CompletionConfig {
                model: api_model,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                timeout: self.config.timeout,
            },
            prompts,
            cache: JudgmentCache::new(self.config.cache_enabled),
            parser: ResponseParser::new(),
        })
    }
}

impl Default for ScoringEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Role;
    use crate::testing::{AllowAll, DenyAll, ScriptedProvider, SlowProvider};
    use trustscore_core::PromptSetError;

    fn engine_with(provider: Arc<ScriptedProvider>) -> ScoringEngine {
        ScoringEngine::builder()
            .model("mock-model")
            .provider(provider)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_both_correct_scores_one() {
        let provider = Arc::new(ScriptedProvider::replies(["answer: [A]", "answer: [A]"]));
        let engine = engine_with(provider.clone());

        let score = engine.score("What is 2+2?", "4").await;
        assert_eq!(score.value(), 1.0);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_correct_then_unsure_scores_three_quarters() {
        let provider = Arc::new(ScriptedProvider::replies(["answer: [A]", "answer: [C]"]));
        let engine = engine_with(provider);

        assert_eq!(engine.score("What is 2+2?", "4").await.value(), 0.75);
    }

    #[tokio::test]
    async fn test_both_incorrect_scores_zero() {
        let provider = Arc::new(ScriptedProvider::replies(["answer: [B]", "answer: [B]"]));
        let engine = engine_with(provider);

        assert_eq!(engine.score("What is 2+2?", "5").await.value(), 0.0);
    }

    #[tokio::test]
    async fn test_prompts_rendered_in_order_with_engine_settings() {
        let provider = Arc::new(ScriptedProvider::replies(["answer: A", "answer: A"]));
        let engine = ScoringEngine::builder()
            .model("mock-model")
            .temperature(0.3)
            .provider(provider.clone())
            .build()
            .unwrap();

        engine.score("What is the capital of France?", "Paris").await;

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].messages.len(), 1);
        assert_eq!(calls[0].messages[0].role, Role::User);
        assert!(calls[0].messages[0]
            .content
            .contains("Question: What is the capital of France?\nProposed Answer: Paris"));
        assert!(calls[1].messages[0].content.contains("Are you really sure"));
        assert_eq!(calls[0].config.temperature, 0.3);
        assert_eq!(calls[0].config.model, "mock-model");
    }

    #[tokio::test]
    async fn test_cache_prevents_repeat_calls() {
        let provider = Arc::new(ScriptedProvider::replies(["answer: [A]", "answer: [C]"]));
        let engine = engine_with(provider.clone());

        let first = engine.score("q", "a").await;
        let second = engine.score("q", "a").await;

        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(engine.cache().entry_count().await, 2);

        let report = engine.score_detailed("q", "a").await;
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.source == JudgmentSource::Cache));
    }

    #[tokio::test]
    async fn test_disabled_cache_repeats_calls() {
        let provider = Arc::new(ScriptedProvider::always("answer: [A]"));
        let engine = ScoringEngine::builder()
            .model("mock-model")
            .cache_enabled(false)
            .provider(provider.clone())
            .build()
            .unwrap();

        engine.score("q", "a").await;
        engine.score("q", "a").await;

        assert_eq!(provider.call_count(), 4);
        assert_eq!(engine.cache().entry_count().await, 0);
        engine.clear_cache();
    }

    #[tokio::test]
    async fn test_clear_cache_forces_new_calls() {
        let provider = Arc::new(ScriptedProvider::always("answer: [B]"));
        let engine = engine_with(provider.clone());

        engine.score("q", "a").await;
        engine.clear_cache();
        engine.score("q", "a").await;

        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_all_failures_score_half() {
        let provider = Arc::new(ScriptedProvider::failing());
        let engine = engine_with(provider.clone());

        let report = engine.score_detailed("q", "a").await;
        assert_eq!(report.score.value(), 0.5);
        assert_eq!(report.fallback_count(), 2);
        assert!(report.outcomes.iter().all(|o| o.judgment == Judgment::Unsure));

        // Fallback judgments are memoized like parsed ones
        assert_eq!(engine.cache().entry_count().await, 2);
        assert_eq!(engine.score("q", "a").await.value(), 0.5);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_prompts_are_not_retried_on_repeat_score() {
        let provider = Arc::new(ScriptedProvider::script(vec![
            Err(ProviderError::HttpError("connection reset".to_string())),
            Err(ProviderError::Timeout(Duration::from_secs(15))),
            Ok("answer: [A]".to_string()),
            Ok("answer: [A]".to_string()),
        ]));
        let engine = engine_with(provider.clone());

        let first = engine.score("q", "a").await;
        let second = engine.score_detailed("q", "a").await;

        assert_eq!(first.value(), 0.5);
        assert_eq!(second.score, first);
        assert!(second
            .outcomes
            .iter()
            .all(|o| o.source == JudgmentSource::Cache));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_isolated_to_one_prompt() {
        let provider = Arc::new(ScriptedProvider::script(vec![
            Err(ProviderError::HttpError("connection reset".to_string())),
            Ok("answer: [A]".to_string()),
        ]));
        let engine = engine_with(provider);

        let report = engine.score_detailed("q", "a").await;
        assert_eq!(report.score.value(), 0.75);
        assert!(matches!(
            &report.outcomes[0].source,
            JudgmentSource::Fallback { reason } if reason.contains("connection reset")
        ));
        assert_eq!(report.outcomes[1].source, JudgmentSource::Model);
    }

    #[tokio::test]
    async fn test_unparseable_reply_scores_half_and_is_reported() {
        let provider = Arc::new(ScriptedProvider::replies(["I think so?", "answer: [A]"]));
        let engine = engine_with(provider);

        let report = engine.score_detailed("q", "a").await;
        assert_eq!(report.outcomes[0].judgment, Judgment::Unparseable);
        assert_eq!(report.score.value(), 0.75);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let engine = ScoringEngine::builder()
            .model("mock-model")
            .timeout(Duration::from_millis(50))
            .provider(Arc::new(SlowProvider::new(Duration::from_secs(3600))))
            .build()
            .unwrap();

        let report = engine.score_detailed("q", "a").await;
        assert_eq!(report.score.value(), 0.5);
        assert_eq!(report.fallback_count(), 2);
    }

    #[tokio::test]
    async fn test_custom_templates() {
        let provider = Arc::new(ScriptedProvider::always("answer: (a)"));
        let engine = ScoringEngine::builder()
            .model("mock-model")
            .prompt_templates([
                "Is {answer} correct for {question}? (A) Yes (B) No (C) Maybe",
                "Double-check: {answer} for {question}? (A) Yes (B) No (C) Maybe",
                "Last chance: {answer} / {question}",
            ])
            .provider(provider.clone())
            .build()
            .unwrap();

        assert_eq!(engine.prompts().len(), 3);
        assert_eq!(engine.score("2+2", "4").await.value(), 1.0);
        assert_eq!(provider.call_count(), 3);
        assert!(provider.calls()[0].messages[0].content.starts_with("Is 4 correct for 2+2?"));
    }

    #[test]
    fn test_malformed_template_fails_build() {
        let result = ScoringEngine::builder()
            .model("mock-model")
            .prompt_templates(["Is {answr} right for {question}?"])
            .provider(Arc::new(ScriptedProvider::always("answer: A")))
            .build();

        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidPromptSet(PromptSetError::InvalidTemplate { index: 0, .. }))
        ));
    }

    #[test]
    fn test_empty_prompt_set_fails_build() {
        let result = ScoringEngine::builder()
            .model("mock-model")
            .prompt_templates(Vec::<String>::new())
            .provider(Arc::new(ScriptedProvider::always("answer: A")))
            .build();

        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidPromptSet(PromptSetError::Empty))
        ));
    }

    #[test]
    fn test_missing_credential_fails_fast() {
        let provider = Arc::new(ScriptedProvider::always("answer: A"));
        let result = ScoringEngine::builder()
            .model("gpt-4")
            .credentials(Arc::new(DenyAll))
            .provider(provider.clone())
            .build();

        match result {
            Err(ConfigurationError::MissingCredential(msg)) => assert!(msg.contains("gpt-4")),
            other => panic!("Expected MissingCredential, got {:?}", other.map(|_| ())),
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_unroutable_model_without_provider_fails() {
        let result = ScoringEngine::builder()
            .model("mock-model")
            .credentials(Arc::new(AllowAll))
            .registry(ProviderRegistry::new())
            .build();

        assert!(matches!(result, Err(ConfigurationError::Provider(_))));
    }

    #[test]
    fn test_invalid_temperature_fails_build() {
        let result = ScoringEngine::builder()
            .model("mock-model")
            .temperature(f32::NAN)
            .provider(Arc::new(ScriptedProvider::always("answer: A")))
            .build();

        assert!(matches!(result, Err(ConfigurationError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_config_round_trip() {
        let config = EngineConfig {
            temperature: 0.7,
            cache_enabled: false,
            timeout: Duration::from_secs(5),
            ..EngineConfig::new("mock-model")
        };
        let engine = ScoringEngine::builder()
            .config(config)
            .provider(Arc::new(ScriptedProvider::always("answer: A")))
            .build()
            .unwrap();

        assert_eq!(engine.model(), "mock-model");
        assert_eq!(engine.temperature(), 0.7);
        assert_eq!(engine.timeout(), Duration::from_secs(5));
        assert!(!engine.cache().is_enabled());
    }

    #[tokio::test]
    async fn test_distinct_pairs_do_not_share_entries() {
        let provider = Arc::new(ScriptedProvider::replies([
            "answer: [A]",
            "answer: [A]",
            "answer: [B]",
            "answer: [B]",
        ]));
        let engine = engine_with(provider.clone());

        // Same text split differently between question and answer
        assert_eq!(engine.score("a|b", "c").await.value(), 1.0);
        assert_eq!(engine.score("a", "b|c").await.value(), 0.0);
        assert_eq!(provider.call_count(), 4);
    }
}
