//! Deterministic hashing embedder.

use super::Embedder;
use crate::Result;
use async_trait::async_trait;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Deterministic bag-of-words hashing embedder.
///
/// Each whitespace-separated token is hashed into a fixed-size bucket space
/// and the resulting count vector is unit-normalized. Texts sharing tokens get
/// proportionally similar vectors, which is enough for tests and for a
/// degraded mode when no model-backed embedder is available. Identical input
/// always produces an identical vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a hashing embedder with the given dimensionality.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        // Truncation is fine: we only need a bucket index.
        #[allow(clippy::cast_possible_truncation)]
        {
            (hasher.finish() as usize) % self.dimensions
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimensions];
        for token in text.split_whitespace() {
            let normalized = token.to_lowercase();
            let trimmed = normalized.trim_matches(|c: char| !c.is_alphanumeric());
            if trimmed.is_empty() {
                continue;
            }
            vector[self.bucket(trimmed)] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}
