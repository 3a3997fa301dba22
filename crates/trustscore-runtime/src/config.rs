//! Engine configuration.
//!
//! Defaults are resolved once into an [`EngineConfig`] and handed to the
//! engine builder. Nothing here is global: two engines built from different
//! configs never share state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::secrets::read_env;
use crate::ConfigurationError;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini/gemini-pro";

/// Environment variables read by [`EngineConfig::from_env`].
pub const MODEL_ENV: &str = "TRUSTSCORE_MODEL";
pub const LEGACY_MODEL_ENV: &str = "DEFAULT_MODEL";
pub const TEMPERATURE_ENV: &str = "TRUSTSCORE_TEMPERATURE";
pub const CACHE_ENV: &str = "TRUSTSCORE_CACHE";
pub const TIMEOUT_ENV: &str = "TRUSTSCORE_TIMEOUT";

/// Settings for one scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model identifier, e.g. `gpt-4` or `gemini/gemini-pro`
    pub model: String,

    /// Sampling temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Memoize judgments per (question, answer, prompt index)
    pub cache_enabled: bool,

    /// Per-call deadline; an expired call counts as a provider failure
    #[serde(with = "duration_human")]
    pub timeout: Duration,

    /// Maximum tokens per reflection reply
    pub max_tokens: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            cache_enabled: true,
            timeout: Duration::from_secs(15),
            max_tokens: 500,
        }
    }
}

impl EngineConfig {
    /// Create a config for the given model with default settings.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Build a config from defaults overridden by environment variables.
    ///
    /// `TRUSTSCORE_MODEL` wins over `DEFAULT_MODEL`. Malformed values are
    /// rejected rather than ignored.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let mut config = Self::default();

        if let Some(model) = read_env(MODEL_ENV).or_else(|| read_env(LEGACY_MODEL_ENV)) {
            config.model = model;
        }

        if let Some(raw) = read_env(TEMPERATURE_ENV) {
            config.temperature = raw.trim().parse().map_err(|_| {
                ConfigurationError::InvalidConfig(format!(
                    "{} must be a number, got '{}'",
                    TEMPERATURE_ENV, raw
                ))
            })?;
        }

        if let Some(raw) = read_env(CACHE_ENV) {
            config.cache_enabled = parse_flag(&raw).ok_or_else(|| {
                ConfigurationError::InvalidConfig(format!(
                    "{} must be true/false/1/0, got '{}'",
                    CACHE_ENV, raw
                ))
            })?;
        }

        if let Some(raw) = read_env(TIMEOUT_ENV) {
            config.timeout = humantime::parse_duration(raw.trim()).map_err(|e| {
                ConfigurationError::InvalidConfig(format!("{}: {}", TIMEOUT_ENV, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.model.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfig(
                "model identifier is empty".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigurationError::InvalidConfig(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Durations as humantime strings ("15s", "1m 30s").
mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
