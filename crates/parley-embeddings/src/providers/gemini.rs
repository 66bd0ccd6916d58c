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

//! Google Generative Language API (`models/*:embedContent`)

use super::{error_from_response, into_vector, resolve_api_key, EmbeddingClient, EmbeddingRequest};
use crate::config::{known_model_dimensions, ApiKeySource, EmbeddingConfig, ProviderKind};
use crate::errors::UpstreamServiceError;
use crate::vector::EmbeddingVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "gemini";

/// Gemini embedding client
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: ApiKeySource,
    expected_dimensions: Option<usize>,
    output_dimensionality: Option<usize>,
    task_type: Option<String>,
}

impl GeminiEmbeddingClient {
    /// Create a client for the default model and endpoint
    pub fn new(api_key: ApiKeySource) -> Self {
        Self::with_base_url(api_key, ProviderKind::Gemini.default_base_url())
    }

    /// Create a client against a custom API root
    pub fn with_base_url(api_key: ApiKeySource, base_url: impl Into<String>) -> Self {
        let model = ProviderKind::Gemini.default_model().to_string();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            expected_dimensions: known_model_dimensions(&model),
            model,
            api_key,
            output_dimensionality: None,
            task_type: None,
        }
    }

    /// Use another model. A leading `models/` is accepted and dropped.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = model.strip_prefix("models/").unwrap_or(&model).to_string();
        self.expected_dimensions = self
            .output_dimensionality
            .or_else(|| known_model_dimensions(&self.model));
        self
    }

    /// Ask the model for truncated output of `dimensions` elements
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.output_dimensionality = Some(dimensions);
        self.expected_dimensions = Some(dimensions);
        self
    }

    /// Set the task type hint, e.g. `RETRIEVAL_QUERY`
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub(crate) fn from_config(config: &EmbeddingConfig, client: reqwest::Client) -> Self {
        let mut this = Self::with_base_url(config.api_key_source(), config.base_url())
            .with_model(config.model());
        this.client = client;
        if let Some(dimensions) = config.dimensions {
            this = this.with_dimensions(dimensions);
        }
        if let Some(task_type) = &config.task_type {
            this = this.with_task_type(task_type.clone());
        }
        this
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.expected_dimensions
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingVector, UpstreamServiceError> {
        let api_key = resolve_api_key(SERVICE, &self.api_key)?;

        let body = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part {
                    text: &request.text,
                }],
            },
            task_type: self.task_type.as_deref(),
            output_dimensionality: self.output_dimensionality,
        };

        tracing::debug!(
            provider = SERVICE,
            model = %self.model,
            input_len = request.text.len(),
            "Sending embedContent request"
        );

        let response = self
            .client
            .post(format!("{}:embedContent", self.model_url()))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamServiceError::from_transport(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(SERVICE, response).await);
        }

        let parsed: EmbedContentResponse = response.json().await.map_err(|e| {
            UpstreamServiceError::new(SERVICE, format!("malformed response: {}", e))
        })?;

        let values = parsed
            .embedding
            .map(|embedding| embedding.values)
            .ok_or_else(|| {
                UpstreamServiceError::new(SERVICE, "malformed response: no embedding returned")
            })?;

        into_vector(SERVICE, values, self.expected_dimensions)
    }

    async fn health_check(&self) -> Result<(), UpstreamServiceError> {
        let api_key = resolve_api_key(SERVICE, &self.api_key)?;

        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| UpstreamServiceError::from_transport(SERVICE, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(SERVICE, response).await)
        }
    }
}
