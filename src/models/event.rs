//! Event types for the knowledge graph.

use super::ScopeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an extracted event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Creates a new event ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the event ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An atomic extracted content unit.
///
/// Events summarize part of a document or conversation and are the unit the
/// engine ranks and returns. They are owned by the extraction subsystem and
/// read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Short title.
    pub title: String,
    /// One-paragraph summary.
    pub summary: String,
    /// Full extracted content.
    pub content: String,
    /// The scope this event belongs to.
    pub scope_id: ScopeId,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        id: EventId,
        scope_id: ScopeId,
        title: impl Into<String>,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            summary: summary.into(),
            content: content.into(),
            scope_id,
        }
    }
}
