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

//! Embedding provider implementations for hosted services

pub mod gemini;
pub mod openai;

pub use gemini::GeminiEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

use crate::config::{ApiKeySource, EmbeddingConfig, ProviderKind};
use crate::errors::{ConfigError, UpstreamServiceError};
use crate::vector::EmbeddingVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single piece of text to embed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Input text, sent upstream as-is
    pub text: String,
}

impl EmbeddingRequest {
    /// Create a request for `text`
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for EmbeddingRequest {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for EmbeddingRequest {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// Trait for hosted text-embedding models.
///
/// Every call to [`embed`](EmbeddingClient::embed) makes exactly one request
/// upstream. Nothing is cached, batched or retried, and implementations hold
/// no mutable state, so one client can serve concurrent callers.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Model identifier sent upstream
    fn model(&self) -> &str;

    /// Expected vector length, when known
    fn dimensions(&self) -> Option<usize>;

    /// Embed one piece of text
    async fn embed(&self, request: EmbeddingRequest)
        -> Result<EmbeddingVector, UpstreamServiceError>;

    /// Check that the provider is reachable and accepts our credentials
    async fn health_check(&self) -> Result<(), UpstreamServiceError>;
}

/// Build the client described by `config`.
pub fn build_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>, ConfigError> {
    config.validate()?;
    let http = config.http_client()?;
    let client: Box<dyn EmbeddingClient> = match config.provider {
        ProviderKind::Gemini => Box::new(GeminiEmbeddingClient::from_config(config, http)),
        ProviderKind::OpenAi => Box::new(OpenAiEmbeddingClient::from_config(config, http)),
    };
    tracing::debug!(
        provider = client.name(),
        model = client.model(),
        "Built embedding client"
    );
    Ok(client)
}

/// Resolve the API key for one call, failing as an authentication error.
pub(crate) fn resolve_api_key(
    service: &str,
    source: &ApiKeySource,
) -> Result<String, UpstreamServiceError> {
    source.resolve().ok_or_else(|| {
        UpstreamServiceError::new(
            service,
            format!("authentication failed: no API key in {}", source.describe()),
        )
    })
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Turn a non-success response into an error, keeping the upstream message.
pub(crate) async fn error_from_response(
    service: &str,
    response: reqwest::Response,
) -> UpstreamServiceError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let details = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(ErrorEnvelope { error }) => {
            let label = error.status.or(error.kind);
            match (label, error.message) {
                (Some(label), Some(message)) => format!("{} ({}): {}", status, label, message),
                (None, Some(message)) => format!("{}: {}", status, message),
                (Some(label), None) => format!("{} ({})", status, label),
                (None, None) => status.to_string(),
            }
        }
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body.trim()),
    };

    tracing::warn!(provider = service, status = status.as_u16(), "Embedding request rejected");
    UpstreamServiceError::new(service, details).with_status(status.as_u16())
}

/// Validate raw values from a response body.
pub(crate) fn into_vector(
    service: &str,
    values: Vec<f32>,
    expected: Option<usize>,
) -> Result<EmbeddingVector, UpstreamServiceError> {
    let result = match expected {
        Some(expected) => EmbeddingVector::with_dimensions(values, expected),
        None => EmbeddingVector::new(values),
    };
    result.map_err(|e| UpstreamServiceError::new(service, format!("malformed response: {}", e)))
}
