// Copyright 2024 Parley Developers
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client configuration loaded from the environment or a JSON file.
//!
//! Only the *name* of the environment variable holding the API key is ever
//! stored here. The key itself is read on every call.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Environment variable selecting the provider.
pub const PROVIDER_ENV: &str = "PARLEY_EMBEDDING_PROVIDER";
/// Environment variable overriding the model.
pub const MODEL_ENV: &str = "PARLEY_EMBEDDING_MODEL";
/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "PARLEY_EMBEDDING_BASE_URL";
/// Environment variable naming the variable that holds the API key.
pub const API_KEY_ENV_ENV: &str = "PARLEY_EMBEDDING_API_KEY_ENV";
/// Environment variable overriding the expected dimensionality.
pub const DIMENSIONS_ENV: &str = "PARLEY_EMBEDDING_DIMENSIONS";
/// Environment variable setting the Gemini task type.
pub const TASK_TYPE_ENV: &str = "PARLEY_EMBEDDING_TASK_TYPE";
/// Environment variable setting the transport timeout.
pub const TIMEOUT_ENV: &str = "PARLEY_EMBEDDING_TIMEOUT_SECS";

/// Hosted embedding service to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Generative Language API (`embedContent`)
    #[default]
    Gemini,
    /// OpenAI `/embeddings` and compatible gateways
    OpenAi,
}

impl ProviderKind {
    /// Short name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "text-embedding-004",
            ProviderKind::OpenAi => "text-embedding-3-small",
        }
    }

    /// API root used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding the API key when none is configured.
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" | "open-ai" => Ok(ProviderKind::OpenAi),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Known output sizes of hosted embedding models.
pub fn known_model_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-004" | "text-embedding-005" | "embedding-001" => Some(768),
        "gemini-embedding-001" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Where the API key comes from
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    /// Read the named environment variable on every call
    Env(String),
    /// A key supplied directly by the embedding program
    Literal(String),
}

impl ApiKeySource {
    /// Resolve the key now. Empty values count as missing.
    pub fn resolve(&self) -> Option<String> {
        let key = match self {
            ApiKeySource::Env(var) => env::var(var).ok()?,
            ApiKeySource::Literal(key) => key.clone(),
        };
        let key = key.trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Human readable description that never contains the key.
    pub fn describe(&self) -> String {
        match self {
            ApiKeySource::Env(var) => format!("environment variable {}", var),
            ApiKeySource::Literal(_) => "literal key".to_string(),
        }
    }
}

impl fmt::Debug for ApiKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeySource::Env(var) => f.debug_tuple("Env").field(var).finish(),
            ApiKeySource::Literal(_) => f.debug_tuple("Literal").field(&"<redacted>").finish(),
        }
    }
}

/// Settings for building an [`EmbeddingClient`](crate::EmbeddingClient).
///
/// Unset fields fall back to the provider's defaults.
///
/// # Example
/// ```
/// use parley_embeddings::{EmbeddingConfig, ProviderKind};
///
/// let cfg = EmbeddingConfig {
///     provider: ProviderKind::OpenAi,
///     model: Some("text-embedding-3-large".into()),
///     ..Default::default()
/// };
/// assert_eq!(cfg.expected_dimensions(), Some(3072));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Hosted service to call.
    pub provider: ProviderKind,
    /// Model identifier sent upstream.
    pub model: Option<String>,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Expected (and, where supported, requested) output size.
    pub dimensions: Option<usize>,
    /// Gemini task type such as `RETRIEVAL_DOCUMENT`. Ignored by OpenAI.
    pub task_type: Option<String>,
    /// Transport timeout. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl EmbeddingConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get(PROVIDER_ENV) {
            Some(name) => name.parse()?,
            None => ProviderKind::default(),
        };

        let config = Self {
            provider,
            model: get(MODEL_ENV),
            base_url: get(BASE_URL_ENV),
            api_key_env: get(API_KEY_ENV_ENV),
            dimensions: get(DIMENSIONS_ENV)
                .map(|v| parse_number(DIMENSIONS_ENV, &v))
                .transpose()?,
            task_type: get(TASK_TYPE_ENV),
            timeout_secs: get(TIMEOUT_ENV)
                .map(|v| parse_number(TIMEOUT_ENV, &v))
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every set value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(invalid("model", "must not be empty"));
            }
        }
        let base = Url::parse(&self.base_url())?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("base_url", "scheme must be http or https"));
        }
        if self.dimensions == Some(0) {
            return Err(invalid("dimensions", "must be greater than zero"));
        }
        if self.timeout_secs == Some(0) {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    /// Model, falling back to the provider default.
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Source of the API key.
    pub fn api_key_source(&self) -> ApiKeySource {
        ApiKeySource::Env(
            self.api_key_env
                .clone()
                .unwrap_or_else(|| self.provider.default_api_key_env().to_string()),
        )
    }

    /// Configured dimensionality, or the known size of the model.
    pub fn expected_dimensions(&self) -> Option<usize> {
        self.dimensions
            .or_else(|| known_model_dimensions(&self.model()))
    }

    /// Transport timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Build the shared HTTP client.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(key, &e.to_string()))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_target_gemini() {
        let cfg = EmbeddingConfig::default();
        assert_eq!(cfg.provider, ProviderKind::Gemini);
        assert_eq!(cfg.model(), "text-embedding-004");
        assert_eq!(
            cfg.base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            cfg.api_key_source(),
            ApiKeySource::Env("GEMINI_API_KEY".into())
        );
        assert_eq!(cfg.expected_dimensions(), Some(768));
        assert!(cfg.timeout().is_none());
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = EmbeddingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, EmbeddingConfig::default());
    }

    #[test]
    fn environment_overrides() {
        let cfg = EmbeddingConfig::from_lookup(lookup(&[
            (PROVIDER_ENV, "OpenAI"),
            (MODEL_ENV, "text-embedding-3-large"),
            (BASE_URL_ENV, "https://gateway.example.com/v1/"),
            (API_KEY_ENV_ENV, "GATEWAY_KEY"),
            (TIMEOUT_ENV, "15"),
        ]))
        .unwrap();

        assert_eq!(cfg.provider, ProviderKind::OpenAi);
        assert_eq!(cfg.model(), "text-embedding-3-large");
        assert_eq!(cfg.base_url(), "https://gateway.example.com/v1");
        assert_eq!(cfg.api_key_source(), ApiKeySource::Env("GATEWAY_KEY".into()));
        assert_eq!(cfg.expected_dimensions(), Some(3072));
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = EmbeddingConfig::from_lookup(lookup(&[(MODEL_ENV, "   ")])).unwrap();
        assert!(cfg.model.is_none());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = EmbeddingConfig::from_lookup(lookup(&[(PROVIDER_ENV, "cohere")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(name) if name == "cohere"));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err =
            EmbeddingConfig::from_lookup(lookup(&[(DIMENSIONS_ENV, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == DIMENSIONS_ENV));

        let err = EmbeddingConfig::from_lookup(lookup(&[(DIMENSIONS_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "dimensions"));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let err = EmbeddingConfig::from_lookup(lookup(&[(BASE_URL_ENV, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));

        let err =
            EmbeddingConfig::from_lookup(lookup(&[(BASE_URL_ENV, "ftp://example.com")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_model_has_no_expected_dimensions() {
        let cfg = EmbeddingConfig {
            model: Some("some-future-model".into()),
            ..Default::default()
        };
        assert_eq!(cfg.expected_dimensions(), None);
    }

    #[test]
    fn explicit_dimensions_win() {
        let cfg = EmbeddingConfig {
            dimensions: Some(256),
            ..Default::default()
        };
        assert_eq!(cfg.expected_dimensions(), Some(256));
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!(" openai ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"provider": "openai", "dimensions": 512, "timeout_secs": 30}}"#
        )
        .unwrap();

        let cfg = EmbeddingConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.provider, ProviderKind::OpenAi);
        assert_eq!(cfg.dimensions, Some(512));
        assert_eq!(cfg.model(), "text-embedding-3-small");
    }

    #[test]
    fn missing_json_file_is_io_error() {
        let err = EmbeddingConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn literal_key_is_redacted_in_debug() {
        let source = ApiKeySource::Literal("sk-secret".into());
        let debug = format!("{:?}", source);
        assert!(!debug.contains("sk-secret"));
        assert!(!source.describe().contains("sk-secret"));
        assert_eq!(source.resolve().as_deref(), Some("sk-secret"));
    }

    #[test]
    fn blank_literal_key_counts_as_missing() {
        assert_eq!(ApiKeySource::Literal("  ".into()).resolve(), None);
    }

    #[test]
    fn env_key_is_read_at_resolve_time() {
        let source = ApiKeySource::Env("PARLEY_TEST_KEY_RESOLVE_TIME".into());
        assert_eq!(source.resolve(), None);

        env::set_var("PARLEY_TEST_KEY_RESOLVE_TIME", "k1");
        assert_eq!(source.resolve().as_deref(), Some("k1"));

        env::set_var("PARLEY_TEST_KEY_RESOLVE_TIME", "k2");
        assert_eq!(source.resolve().as_deref(), Some("k2"));

        env::remove_var("PARLEY_TEST_KEY_RESOLVE_TIME");
    }
}
