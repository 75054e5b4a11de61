//! Association edges between entities and events.

use super::{EntityId, EventId};
use serde::{Deserialize, Serialize};

/// A weighted many-to-many link between one entity and one event.
///
/// `weight` is the entity's importance *within that specific event*, distinct
/// from the entity's default weight. The graph induced by all edges for a
/// scope is bipartite (entity nodes ↔ event nodes) and may contain cycles
/// when traversed: an entity can be reached via multiple event paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// The event side of the edge.
    pub event_id: EventId,
    /// The entity side of the edge.
    pub entity_id: EntityId,
    /// Importance of the entity within this event.
    pub weight: f32,
}

impl Association {
    /// Creates a new association edge.
    #[must_use]
    pub fn new(event_id: EventId, entity_id: EntityId, weight: f32) -> Self {
        Self {
            event_id,
            entity_id,
            weight,
        }
    }
}
