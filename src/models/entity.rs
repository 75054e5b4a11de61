//! Entity types for the knowledge graph.
//!
//! Entities are typed, named concepts extracted from source content by the
//! extraction subsystem. They are read-only from the engine's perspective:
//! search traverses them but never creates or mutates them.
//!
//! # Entity Types
//!
//! | Type | Description | Examples |
//! |------|-------------|----------|
//! | `Person` | Named individuals | "Alice Johnson", "@username" |
//! | `Organization` | Companies, teams, groups | "Acme Corp", "Backend Team" |
//! | `Location` | Places | "Berlin", "us-east-1" |
//! | `Concept` | Abstract ideas, patterns | "event sourcing", "backpressure" |
//! | `Object` | Concrete artifacts | "invoice #1042", "release v2.1" |
//! | `Other` | Anything uncategorized | |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum default importance weight an entity can carry.
pub const MAX_ENTITY_WEIGHT: f32 = 9.99;

/// Unique identifier for a graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the entity ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Category code for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A named individual.
    Person,
    /// A company, team or group.
    Organization,
    /// A physical or logical place.
    Location,
    /// An abstract idea or pattern.
    Concept,
    /// A concrete artifact.
    Object,
    /// Anything uncategorized.
    Other,
}

impl EntityType {
    /// All entity types.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Person,
            Self::Organization,
            Self::Location,
            Self::Concept,
            Self::Object,
            Self::Other,
        ]
    }

    /// Returns the type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Location => "location",
            Self::Concept => "concept",
            Self::Object => "object",
            Self::Other => "other",
        }
    }

    /// Parses an entity type string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "organization" | "org" => Some(Self::Organization),
            "location" => Some(Self::Location),
            "concept" => Some(Self::Concept),
            "object" => Some(Self::Object),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// A typed, named concept extracted from source content.
///
/// `weight` is the entity's *default* importance on a `0.00..=9.99` scale;
/// association edges carry a separate per-event weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Category code.
    pub entity_type: EntityType,
    /// Canonical name.
    pub name: String,
    /// Default importance weight (`0.00..=9.99`).
    pub weight: f32,
}

impl Entity {
    /// Creates a new entity with a neutral weight of `1.0`.
    #[must_use]
    pub fn new(id: EntityId, entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id,
            entity_type,
            name: name.into(),
            weight: 1.0,
        }
    }

    /// Sets the default importance weight, clamped to `0.00..=9.99`.
    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight.clamp(0.0, MAX_ENTITY_WEIGHT);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parse_roundtrip() {
        for t in EntityType::all() {
            assert_eq!(EntityType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntityType::parse("ORG"), Some(EntityType::Organization));
        assert_eq!(EntityType::parse("banana"), None);
    }

    #[test]
    fn test_entity_weight_clamped() {
        let id = EntityId::new("ent-1");
        let e = Entity::new(id.clone(), EntityType::Concept, "caching").with_weight(12.5);
        assert!((e.weight - MAX_ENTITY_WEIGHT).abs() < f32::EPSILON);

        let e = Entity::new(id, EntityType::Concept, "caching").with_weight(-1.0);
        assert!(e.weight.abs() < f32::EPSILON);
    }

    #[test]
    fn test_entity_default_weight() {
        let e = Entity::new(EntityId::new("ent-2"), EntityType::Person, "Alice");
        assert!((e.weight - 1.0).abs() < f32::EPSILON);
    }
}
