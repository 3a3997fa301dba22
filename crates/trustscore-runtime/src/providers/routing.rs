//! Model routing and credential checks.
//!
//! A model identifier such as `gpt-4`, `claude-3-opus` or
//! `gemini/gemini-pro` decides which provider serves it and which API key it
//! needs. The scoring engine asks a [`CredentialCheck`] once, when it is
//! built, so a missing key fails fast instead of degrading every score.

use serde_json::Value as JsonValue;

use super::secrets::{read_env, ApiCredential};

/// Built-in provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// All built-in kinds, in diagnostic order.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::Anthropic,
    ];

    /// Registry key for this kind.
    pub fn provider_type(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Name used in credential diagnostics.
    pub fn credential_label(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Anthropic API key",
            ProviderKind::OpenAi => "OpenAI API key",
            ProviderKind::Gemini => "Gemini API key",
        }
    }

    /// Environment variable holding the API key.
    pub fn env_var(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Where a model identifier is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    /// Provider family
    pub kind: ProviderKind,

    /// Model name as the provider API expects it (routing prefix removed)
    pub api_model: String,
}

/// Resolve a model identifier to its provider.
///
/// Returns `None` for identifiers no built-in provider recognizes.
pub fn route_model(model: &str) -> Option<ModelRoute> {
    let route = |kind, api_model: &str| {
        Some(ModelRoute {
            kind,
            api_model: api_model.to_string(),
        })
    };

    if let Some(rest) = model.strip_prefix("anthropic/") {
        return route(ProviderKind::Anthropic, rest);
    }
    if let Some(rest) = model.strip_prefix("openai/") {
        return route(ProviderKind::OpenAi, rest);
    }
    if let Some(rest) = model.strip_prefix("gemini/") {
        return route(ProviderKind::Gemini, rest);
    }

    if model.starts_with("claude") {
        route(ProviderKind::Anthropic, model)
    } else if model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") {
        route(ProviderKind::OpenAi, model)
    } else if model.starts_with("gemini-") {
        route(ProviderKind::Gemini, model)
    } else {
        None
    }
}

/// Reports whether a usable credential exists for a model.
pub trait CredentialCheck: Send + Sync {
    /// `Ok` if the model can be called, otherwise a human-readable diagnostic.
    fn check(&self, model: &str) -> Result<(), String>;
}

/// Credential check backed by provider config and environment variables.
///
/// `config` is the provider JSON config; an `api_key` field there satisfies
/// the check for the routed provider. Otherwise the provider's environment
/// variable must be set. Models with no known route pass, since no built-in
/// provider can say what they need.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    config: JsonValue,
}

impl EnvCredentials {
    /// Check the environment only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `config["api_key"]` before the environment.
    pub fn with_config(config: JsonValue) -> Self {
        Self { config }
    }
}

impl CredentialCheck for EnvCredentials {
    fn check(&self, model: &str) -> Result<(), String> {
        let Some(route) = route_model(model) else {
            return Ok(());
        };

        let required = route.kind.env_var();
        if ApiCredential::is_available(&self.config, route.kind) {
            return Ok(());
        }

        let available: Vec<&str> = ProviderKind::ALL
            .iter()
            .map(|kind| kind.env_var())
            .filter(|var| read_env(var).is_some())
            .collect();

        if available.is_empty() {
            Err(format!(
                "No API keys found. Please set {} in your environment",
                required
            ))
        } else {
            Err(format!(
                "Model {} requires {}, but only {:?} found. Choose a matching model or set {}",
                model, required, available, required
            ))
        }
    }
}
