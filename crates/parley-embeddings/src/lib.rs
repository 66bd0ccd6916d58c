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


#![warn(missing_docs)]

//! Text embeddings from hosted generative-AI models for Parley.
//!
//! This crate provides:
//! - An [`EmbeddingClient`] trait: one text in, one fixed-length vector out
//! - Gemini and OpenAI-compatible implementations
//! - Environment and file based configuration
//! - Validated, immutable [`EmbeddingVector`]s with similarity helpers
//!
//! Each call makes a single upstream request. There is no retry, batching or
//! caching; any failure surfaces as an [`UpstreamServiceError`].

pub mod config;
pub mod errors;
pub mod providers;
pub mod vector;

pub use config::{ApiKeySource, EmbeddingConfig, ProviderKind};
pub use errors::{ConfigError, UpstreamServiceError, VectorError};
pub use providers::{
    build_client, EmbeddingClient, EmbeddingRequest, GeminiEmbeddingClient, OpenAiEmbeddingClient,
};
pub use vector::EmbeddingVector;

/// Embed `text` with a client built from the process environment.
///
/// Configuration problems are reported as upstream failures, since from the
/// caller's point of view the hosted model could not be reached.
pub async fn embed_text(text: &str) -> Result<EmbeddingVector, UpstreamServiceError> {
    let config = EmbeddingConfig::from_env()
        .map_err(|e| UpstreamServiceError::new("config", e.to_string()))?;
    let client = build_client(&config)
        .map_err(|e| UpstreamServiceError::new(config.provider.as_str(), e.to_string()))?;
    client.embed(text.into()).await
}
