//! Embedding vectors and similarity helpers

use crate::errors::VectorError;
use serde::{Deserialize, Serialize};

/// A fixed-length semantic encoding of a piece of text.
///
/// Every element is finite and the vector is never empty. The contents cannot
/// be modified after construction; callers that need a mutable buffer take
/// ownership with [`EmbeddingVector::into_inner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    /// Validate `values` and wrap them.
    pub fn new(values: Vec<f32>) -> Result<Self, VectorError> {
        if values.is_empty() {
            return Err(VectorError::Empty);
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(VectorError::NonFinite { index, value });
        }
        Ok(Self { values })
    }

    /// Like [`EmbeddingVector::new`], additionally requiring `expected` elements.
    pub fn with_dimensions(values: Vec<f32>, expected: usize) -> Result<Self, VectorError> {
        if values.len() != expected {
            return Err(VectorError::InvalidDimensions {
                expected,
                actual: values.len(),
            });
        }
        Self::new(values)
    }

    /// Number of elements.
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Borrow the elements.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, f32> {
        self.values.iter()
    }

    /// Give up the wrapper and return the raw values.
    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }

    /// Dot product, or `None` when the lengths differ.
    pub fn dot(&self, other: &EmbeddingVector) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }
        Some(self.iter().zip(other.iter()).map(|(a, b)| a * b).sum())
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> f32 {
        self.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine similarity in `[-1, 1]`.
    ///
    /// Returns `None` for vectors of different lengths or when either vector
    /// has zero norm.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> Option<f32> {
        let dot = self.dot(other)?;
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return None;
        }
        Some((dot / denom).clamp(-1.0, 1.0))
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

impl TryFrom<Vec<f32>> for EmbeddingVector {
    type Error = VectorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<EmbeddingVector> for Vec<f32> {
    fn from(vector: EmbeddingVector) -> Self {
        vector.values
    }
}

impl<'a> IntoIterator for &'a EmbeddingVector {
    type Item = &'a f32;
    type IntoIter = std::slice::Iter<'a, f32>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
