//! API keys for the built-in providers.
//!
//! A key is wrapped in [`SecretString`] the moment it is read and only
//! unwrapped by [`ApiCredential::expose`] when a request header is set. It
//! never appears in `Debug`/`Display` output, tracing fields or errors.
//!
//! Lookup order is the provider JSON config's `api_key` field, then the
//! provider's environment variable. Empty strings count as unset, so an
//! `OPENAI_API_KEY=` line in a shell profile does not make a model look
//! configured.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::routing::ProviderKind;
use super::ProviderError;

/// Config field holding an inline key.
pub const API_KEY_FIELD: &str = "api_key";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        })
    }
}

/// An API key that refuses to print itself.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    label: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, label: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            label,
        }
    }

    /// Load the key for `kind` from `config`, falling back to its environment variable.
    pub fn resolve(kind: ProviderKind, config: &JsonValue) -> Result<Self, ProviderError> {
        lookup(config, kind.env_var())
            .map(|(value, source)| Self::new(value, source, kind.credential_label()))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "{} required: set '{}' in config or {}",
                    kind.credential_label(),
                    API_KEY_FIELD,
                    kind.env_var()
                ))
            })
    }

    /// Whether [`resolve`](Self::resolve) would succeed, without wrapping the key.
    pub fn is_available(config: &JsonValue, kind: ProviderKind) -> bool {
        lookup(config, kind.env_var()).is_some()
    }

    /// The raw key. Use it for a header and drop it.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Human-readable name, e.g. "OpenAI API key".
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, [REDACTED])", self.label, self.source)
    }
}

/// Read a non-empty environment variable.
pub(crate) fn read_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn lookup(config: &JsonValue, env_var: &str) -> Option<(String, CredentialSource)> {
    let inline = config[API_KEY_FIELD]
        .as_str()
        .filter(|v| !v.is_empty())
        .map(|v| (v.to_string(), CredentialSource::Config));

    inline.or_else(|| read_env(env_var).map(|v| (v, CredentialSource::Environment)))
}
