//! Embedding generation.
//!
//! The engine consumes embeddings through the [`Embedder`] trait; real
//! deployments inject a model-backed implementation, while [`HashEmbedder`]
//! provides a deterministic, dependency-free fallback used in tests and as a
//! last-resort degradation.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]

mod hash;

pub use hash::HashEmbedder;

use crate::Result;
use async_trait::async_trait;

/// Trait for embedding generators.
///
/// Embedding is an I/O suspension point of the pipeline (remote model calls),
/// so the trait is async. Implementations must be shareable across concurrent
/// per-scope pipelines (`Send + Sync`).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
