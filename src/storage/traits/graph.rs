//! Graph store trait.
//!
//! The graph store holds the persisted entity/event records and the weighted
//! association edges between them. The engine only reads: entities, events
//! and edges are created by the out-of-scope extraction pipeline.
//!
//! # Error Modes and Guarantees
//!
//! | Operation | Complexity | Notes |
//! |-----------|------------|-------|
//! | `get_entity` / `get_event` | O(1) | by-id lookup |
//! | `get_associations_for_entities` | O(k) | k = edge count |
//! | `get_associations_for_events` | O(k) | k = edge count |
//!
//! A missing record is `Ok(None)`, not an error; errors mean the backend
//! itself failed.

use crate::Result;
use crate::models::{Association, Entity, EntityId, Event, EventId};
use async_trait::async_trait;

/// Trait for graph store backends.
///
/// Graph fetches are suspension points of the pipeline, so every method is
/// async. Implementations must be thread-safe (`Send + Sync`) and are shared
/// via `Arc<dyn GraphStore>`.
///
/// # Implementor Notes
///
/// - Methods take `&self`; use interior mutability for any mutable state
/// - Association lists are returned edge-weight descending so callers can
///   truncate cheaply
/// - Edges never cross scopes; callers pass ids from a single scope per call
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Retrieves an entity by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// Retrieves an event by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    async fn get_event(&self, id: &EventId) -> Result<Option<Event>>;

    /// Fetches all association edges touching any of the given entities.
    ///
    /// Returned edge-weight descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch operation fails.
    async fn get_associations_for_entities(
        &self,
        ids: &[EntityId],
    ) -> Result<Vec<Association>>;

    /// Fetches all association edges touching any of the given events.
    ///
    /// Returned edge-weight descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch operation fails.
    async fn get_associations_for_events(&self, ids: &[EventId]) -> Result<Vec<Association>>;
}
