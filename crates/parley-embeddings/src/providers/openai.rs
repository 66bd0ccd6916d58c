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

//! OpenAI `/embeddings` and compatible gateways

use super::{error_from_response, into_vector, resolve_api_key, EmbeddingClient, EmbeddingRequest};
use crate::config::{known_model_dimensions, ApiKeySource, EmbeddingConfig, ProviderKind};
use crate::errors::UpstreamServiceError;
use crate::vector::EmbeddingVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible embedding client
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: ApiKeySource,
    expected_dimensions: Option<usize>,
    requested_dimensions: Option<usize>,
}

impl OpenAiEmbeddingClient {
    /// Create a new OpenAI client
    pub fn new(api_key: ApiKeySource) -> Self {
        Self::with_base_url(api_key, ProviderKind::OpenAi.default_base_url())
    }

    /// Create a new client with custom base URL
    pub fn with_base_url(api_key: ApiKeySource, base_url: impl Into<String>) -> Self {
        let model = ProviderKind::OpenAi.default_model().to_string();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            expected_dimensions: known_model_dimensions(&model),
            model,
            api_key,
            requested_dimensions: None,
        }
    }

    /// Use another model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.expected_dimensions = self
            .requested_dimensions
            .or_else(|| known_model_dimensions(&self.model));
        self
    }

    /// Request shortened vectors (`text-embedding-3-*` only)
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.requested_dimensions = Some(dimensions);
        self.expected_dimensions = Some(dimensions);
        self
    }

    pub(crate) fn from_config(config: &EmbeddingConfig, client: reqwest::Client) -> Self {
        let mut this = Self::with_base_url(config.api_key_source(), config.base_url())
            .with_model(config.model());
        this.client = client;
        if let Some(dimensions) = config.dimensions {
            this = this.with_dimensions(dimensions);
        }
        this
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        let builder = builder.header("Authorization", format!("Bearer {}", api_key));
        if self.base_url.contains("openrouter.ai") {
            builder.header("X-Title", "Parley")
        } else {
            builder
        }
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    fn name(&self) -> &str {
        if self.base_url.contains("openrouter.ai") {
            "openrouter"
        } else {
            "openai"
        }
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
        let service = self.name();
        let api_key = resolve_api_key(service, &self.api_key)?;

        let body = EmbeddingsRequest {
            model: &self.model,
            input: &request.text,
            dimensions: self.requested_dimensions,
        };

        tracing::debug!(
            provider = service,
            model = %self.model,
            input_len = request.text.len(),
            "Sending embeddings request"
        );

        let response = self
            .authorized(
                self.client.post(format!("{}/embeddings", self.base_url)),
                &api_key,
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamServiceError::from_transport(service, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(service, response).await);
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            UpstreamServiceError::new(service, format!("malformed response: {}", e))
        })?;

        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| {
                UpstreamServiceError::new(service, "malformed response: no embedding returned")
            })?;

        into_vector(service, values, self.expected_dimensions)
    }

    async fn health_check(&self) -> Result<(), UpstreamServiceError> {
        let service = self.name();
        let api_key = resolve_api_key(service, &self.api_key)?;

        let response = self
            .authorized(
                self.client.get(format!("{}/models", self.base_url)),
                &api_key,
            )
            .send()
            .await
            .map_err(|e| UpstreamServiceError::from_transport(service, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(service, response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    /// Build a JSON body mimicking a real OpenAI embeddings response.
    fn make_response(dim: usize) -> serde_json::Value {
        serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": vec![0.1_f32; dim] }],
            "model": "text-embedding-3-small",
            "usage": { "prompt_tokens": 2, "total_tokens": 2 },
        })
    }

    fn client(server: &MockServer) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::with_base_url(ApiKeySource::Literal("sk-test".into()), server.uri())
    }

    #[test]
    fn dim_for_known_and_unknown_models() {
        let key = || ApiKeySource::Literal("k".into());
        assert_eq!(OpenAiEmbeddingClient::new(key()).dimensions(), Some(1536));
        assert_eq!(
            OpenAiEmbeddingClient::new(key())
                .with_model("text-embedding-3-large")
                .dimensions(),
            Some(3072)
        );
        assert_eq!(
            OpenAiEmbeddingClient::new(key())
                .with_model("some-future-model")
                .dimensions(),
            None
        );
    }

    #[test]
    fn name_reflects_gateway() {
        let c = OpenAiEmbeddingClient::with_base_url(
            ApiKeySource::Literal("k".into()),
            "https://openrouter.ai/api/v1",
        );
        assert_eq!(c.name(), "openrouter");
    }

    #[tokio::test]
    async fn sends_bearer_token_and_exact_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "hello world"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(make_response(1536)))
            .expect(1)
            .mount(&server)
            .await;

        let vector = client(&server).embed("hello world".into()).await.unwrap();
        assert_eq!(vector.dimensions(), 1536);
        assert!(vector.iter().all(|v| (v - 0.1).abs() < 1e-6));
    }

    #[tokio::test]
    async fn requested_dimensions_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "x",
                "dimensions": 8
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(make_response(8)))
            .expect(1)
            .mount(&server)
            .await;

        let vector = client(&server)
            .with_dimensions(8)
            .embed("x".into())
            .await
            .unwrap();
        assert_eq!(vector.dimensions(), 8);
    }

    #[tokio::test]
    async fn empty_data_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [],
                "model": "text-embedding-3-small",
            })))
            .mount(&server)
            .await;

        let err = client(&server).embed("test".into()).await.unwrap_err();
        assert!(err.details().contains("no embedding"));
    }

    #[tokio::test]
    async fn auth_error_keeps_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {
                    "message": "Incorrect API key provided.",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key",
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).embed("test".into()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.details().contains("Incorrect API key provided."));
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).health_check().await.unwrap();
    }
}
