//! Vector index trait.
//!
//! Provides the abstraction layer for similarity lookups against the entity
//! and event embedding indexes. Implementations typically wrap an HNSW or
//! similar approximate-nearest-neighbor structure.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use engram::storage::VectorIndex;
//!
//! let hits = index
//!     .search_events(&scopes, &query_vec, 20, 0.25)
//!     .await?;
//! for (id, similarity) in hits {
//!     println!("{}: {:.2}% similar", id, similarity * 100.0);
//! }
//! ```

use crate::Result;
use crate::models::{EntityId, EventId, ScopeId};
use async_trait::async_trait;

/// Trait for vector index backends.
///
/// Index lookups are the recall stage's suspension points, so every method is
/// async. Implementations must be thread-safe (`Send + Sync`) and are shared
/// across concurrent per-scope pipelines via `Arc<dyn VectorIndex>`.
///
/// # Implementor Notes
///
/// - Methods take `&self`; use interior mutability for any mutable state
/// - Returned lists are ordered by descending similarity
/// - Similarity scores are cosine similarities in `[0, 1]`
/// - An unreachable backend should return an error; an empty result set is a
///   valid outcome, not an error
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Searches the entity index.
    ///
    /// `candidate_pool` is the breadth of the underlying candidate scan
    /// (HNSW `ef` or equivalent); `top_k` caps the returned list. Results
    /// below `min_similarity` are excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the index backend is unreachable or the lookup
    /// fails.
    async fn search_entities(
        &self,
        scope_ids: &[ScopeId],
        query_vector: &[f32],
        top_k: usize,
        candidate_pool: usize,
        min_similarity: f32,
    ) -> Result<Vec<(EntityId, f32)>>;

    /// Searches the event index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index backend is unreachable or the lookup
    /// fails.
    async fn search_events(
        &self,
        scope_ids: &[ScopeId],
        query_vector: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(EventId, f32)>>;

    /// Scores specific events against a query vector.
    ///
    /// Used by the expansion stage to compute query relevance for events
    /// reached through the association graph rather than through search.
    /// Events unknown to the index are omitted from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the index backend is unreachable or the lookup
    /// fails.
    async fn score_events(
        &self,
        scope_ids: &[ScopeId],
        query_vector: &[f32],
        event_ids: &[EventId],
    ) -> Result<Vec<(EventId, f32)>>;
}
