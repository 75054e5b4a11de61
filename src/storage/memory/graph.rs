//! In-memory graph store.

use crate::Result;
use crate::models::{Association, Entity, EntityId, Event, EventId};
use crate::storage::traits::GraphStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory graph store holding entities, events and association edges.
///
/// Interior mutability keeps the trait's `&self` contract; inserts are only
/// expected before searches start (the extraction pipeline owns writes in a
/// real deployment).
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    entities: Mutex<HashMap<EntityId, Entity>>,
    events: Mutex<HashMap<EventId, Event>>,
    associations: Mutex<Vec<Association>>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity.
    pub fn upsert_entity(&self, entity: Entity) {
        self.entities
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(entity.id.clone(), entity);
    }

    /// Inserts or replaces an event.
    pub fn upsert_event(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(event.id.clone(), event);
    }

    /// Adds an association edge.
    pub fn insert_association(&self, association: Association) {
        self.associations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(association);
    }
}

/// Sorts edges weight-descending with an id tie-break, as the trait promises.
fn sort_edges(edges: &mut [Association]) {
    edges.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.event_id.cmp(&b.event_id))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self
            .entities
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn get_associations_for_entities(
        &self,
        ids: &[EntityId],
    ) -> Result<Vec<Association>> {
        let mut edges: Vec<Association> = self
            .associations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|edge| ids.contains(&edge.entity_id))
            .cloned()
            .collect();
        sort_edges(&mut edges);
        Ok(edges)
    }

    async fn get_associations_for_events(&self, ids: &[EventId]) -> Result<Vec<Association>> {
        let mut edges: Vec<Association> = self
            .associations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|edge| ids.contains(&edge.event_id))
            .cloned()
            .collect();
        sort_edges(&mut edges);
        Ok(edges)
    }
}
