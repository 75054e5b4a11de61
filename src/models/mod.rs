//! Data models for engram.
//!
//! This module contains the core data structures used throughout the engine:
//! the read-only entity/event graph types owned by the extraction subsystem,
//! and the call-scoped provenance and result types created during one search.

mod association;
mod clue;
mod entity;
mod event;
mod search;

pub use association::Association;
pub use clue::{Clue, ClueLedger, ClueRelation, ClueStage, NodeKind};
pub use entity::{Entity, EntityId, EntityType, MAX_ENTITY_WEIGHT};
pub use event::{Event, EventId};
pub use search::{ScoredEvent, SearchResult, SearchStats};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a content scope.
///
/// Scopes partition the entity/event graph; association edges never cross
/// scopes. A search may target one or more scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
    /// Creates a new scope ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the scope ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ScopeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_roundtrip() {
        let id = ScopeId::new("workspace-1");
        assert_eq!(id.as_str(), "workspace-1");
        assert_eq!(id.to_string(), "workspace-1");
        assert_eq!(ScopeId::from("workspace-1"), id);
    }
}
