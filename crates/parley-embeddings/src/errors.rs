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


//! Error types for embedding operations

use thiserror::Error;

/// Failure of a call to a hosted embedding model.
///
/// Network, authentication, quota and malformed-response failures all map
/// here. The HTTP status is kept when the upstream answered at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Upstream service error ({service}): {details}")]
pub struct UpstreamServiceError {
    service: String,
    status: Option<u16>,
    details: String,
}

impl UpstreamServiceError {
    /// Create an error for `service` with a human readable description.
    pub fn new(service: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: None,
            details: details.into(),
        }
    }

    /// Attach the HTTP status returned by the upstream.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Name of the provider that failed.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// HTTP status, if the upstream responded.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Description of the failure.
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Map a transport error from `reqwest`.
    pub(crate) fn from_transport(service: &str, err: reqwest::Error) -> Self {
        let error = Self::new(service, format!("request failed: {}", err));
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}

/// Errors raised while validating an embedding vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    /// The vector has no elements
    #[error("Embedding vector is empty")]
    Empty,

    /// An element is NaN or infinite
    #[error("Non-finite value {value} at index {index}")]
    NonFinite {
        /// Position of the offending element.
        index: usize,
        /// The value found there.
        value: f32,
    },

    /// Invalid dimensions
    #[error("Invalid dimensions: expected {expected}, got {actual}")]
    InvalidDimensions {
        /// Dimensionality the model is configured for.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },
}

/// Errors raised while loading or applying client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Provider name is not recognised
    #[error("Unknown embedding provider: {0}")]
    UnknownProvider(String),

    /// A setting has an unusable value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting or environment variable name.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Base URL does not parse
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_display_includes_service_and_details() {
        let err = UpstreamServiceError::new("gemini", "quota exhausted").with_status(429);
        assert_eq!(
            err.to_string(),
            "Upstream service error (gemini): quota exhausted"
        );
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.service(), "gemini");
    }

    #[test]
    fn upstream_error_without_status() {
        let err = UpstreamServiceError::new("openai", "connection refused");
        assert_eq!(err.status(), None);
        assert_eq!(err.details(), "connection refused");
    }

    #[test]
    fn vector_error_messages() {
        let err = VectorError::InvalidDimensions {
            expected: 768,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 768, got 3"));

        let err = VectorError::NonFinite {
            index: 2,
            value: f32::NAN,
        };
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn config_error_from_url_parse() {
        let err: ConfigError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }
}
