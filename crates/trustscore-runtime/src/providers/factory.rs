//! Named provider factories.
//!
//! When an engine is given a model identifier but no provider, it routes the
//! model to a provider type ("openai", "anthropic", "gemini") and asks the
//! registry to build one from the engine's provider JSON config.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create_for_model("gpt-4", &serde_json::json!({}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::routing::route_model;
use super::{LlmProvider, ProviderError};

/// Builds providers of one type from JSON config.
pub trait ProviderFactory: Send + Sync {
    /// Registry key, e.g. "anthropic".
    fn provider_type(&self) -> &'static str;

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check `config` without building anything.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    fn default_config(&self) -> JsonValue {
        JsonValue::Object(Default::default())
    }

    fn description(&self) -> &'static str {
        "LLM provider"
    }
}

/// Provider factories by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in factory compiled in by cargo features.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));

        #[cfg(feature = "openai")]
        {
            registry.register(Arc::new(super::OpenAiProviderFactory::openai()));
            registry.register(Arc::new(super::OpenAiProviderFactory::gemini()));
        }

        registry
    }

    /// Add a factory. A later factory with the same type replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type '{}' (registered: {:?})",
                provider_type,
                self.available_types()
            ))
        })
    }

    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(config)
    }

    /// Build the provider that serves `model`.
    ///
    /// Fails for identifiers no route recognizes and for routes whose
    /// provider type is not registered (e.g. its cargo feature is off).
    pub fn create_for_model(
        &self,
        model: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let route = route_model(model).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "No built-in provider serves model '{}'; supply a provider explicitly",
                model
            ))
        })?;

        let provider = self.create(route.kind.provider_type(), config)?;
        tracing::debug!(model, provider = provider.name(), "Routed model to provider");
        Ok(provider)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factories.get(provider_type).map(|f| f.default_config())
    }

    /// `(type, description)` for every registered factory.
    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        self.factories
            .iter()
            .map(|(name, factory)| (*name, factory.description()))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse::text("answer: [A]", config.model.clone()))
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    // Registered as "openai" so routed models reach it
    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "openai"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            self.validate_config(config)?;
            let name = config["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config["name"].is_number() {
                return Err(ProviderError::NotConfigured("name must be a string".into()));
            }
            Ok(())
        }

        fn description(&self) -> &'static str {
            "Echo provider for tests"
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));
        registry
    }

    #[test]
    fn test_register_and_create() {
        let registry = registry();
        assert_eq!(registry.available_types(), vec!["openai"]);
        assert_eq!(registry.describe(), vec![("openai", "Echo provider for tests")]);

        let provider = registry
            .create("openai", &serde_json::json!({ "name": "custom" }))
            .unwrap();
        assert_eq!(provider.name(), "custom");
    }

    #[test]
    fn test_create_for_model_routes() {
        let registry = registry();

        let provider = registry
            .create_for_model("gpt-4", &serde_json::json!({}))
            .unwrap();
        assert_eq!(provider.name(), "echo");

        // Routed, but the type is not registered
        let err = registry
            .create_for_model("claude-3-opus", &serde_json::json!({}))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown provider type 'anthropic'"));

        // Not routed at all
        let err = registry
            .create_for_model("llama-3", &serde_json::json!({}))
            .err()
            .unwrap();
        assert!(err.to_string().contains("llama-3"));
    }

    #[test]
    fn test_validate_and_defaults() {
        let registry = registry();

        assert!(registry.validate("openai", &serde_json::json!({})).is_ok());
        assert!(registry
            .validate("openai", &serde_json::json!({ "name": 3 }))
            .is_err());
        assert!(matches!(
            registry.validate("unknown", &serde_json::json!({})),
            Err(ProviderError::NotConfigured(_))
        ));

        assert_eq!(registry.default_config("openai"), Some(serde_json::json!({})));
        assert_eq!(registry.default_config("unknown"), None);
    }

    #[cfg(all(feature = "anthropic", feature = "openai"))]
    #[test]
    fn test_with_defaults_registers_builtins() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.available_types(), vec!["anthropic", "gemini", "openai"]);
    }
}
