//! Provenance clues and the append-only clue ledger.
//!
//! Every stage of the pipeline records how it reached each candidate as a
//! [`Clue`]. The ledger is append-only for the lifetime of one search call:
//! result caps (`max_results`, per-hop truncation) never shrink it, so a
//! consumer can always reconstruct the full discovery trail. Ordering within
//! the ledger reflects discovery order, not final rank.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stage that recorded a clue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClueStage {
    /// First-pass vector retrieval.
    Recall,
    /// Multi-hop graph traversal.
    Expand,
    /// Final scoring and ordering.
    Rerank,
}

impl ClueStage {
    /// Returns the stage as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recall => "recall",
            Self::Expand => "expand",
            Self::Rerank => "rerank",
        }
    }
}

impl fmt::Display for ClueStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of node a clue endpoint refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The query itself (source of recall clues).
    Query,
    /// An entity node.
    Entity,
    /// An event node.
    Event,
}

impl NodeKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Entity => "entity",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the two endpoints of a clue are related.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClueRelation {
    /// Vector similarity between the query and a candidate.
    SimilarTo,
    /// An entity mentions (is associated with) an event.
    Mentions,
    /// An event mentions an entity discovered through it.
    MentionedBy,
    /// The rerank stage assigned a final fused score.
    Ranked,
}

impl ClueRelation {
    /// Returns the relation as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SimilarTo => "similar-to",
            Self::Mentions => "mentions",
            Self::MentionedBy => "mentioned-by",
            Self::Ranked => "ranked",
        }
    }
}

impl fmt::Display for ClueRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded provenance step.
///
/// Clues are immutable once created and are never reordered or dropped from
/// the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clue {
    /// The stage that recorded this clue.
    pub stage: ClueStage,
    /// Identifier of the source node (`"query"` for recall clues).
    pub from_id: String,
    /// Kind of the source node.
    pub from_kind: NodeKind,
    /// Identifier of the target node.
    pub to_id: String,
    /// Kind of the target node.
    pub to_kind: NodeKind,
    /// How the endpoints relate.
    pub relation: ClueRelation,
    /// Score attached to this step (similarity, edge weight, fused score).
    pub score: f32,
    /// Traversal hop at which the step happened (0 for recall/rerank).
    pub hop: u32,
}

/// Append-only provenance log for one search call.
///
/// Shared by all three stages of a call and returned alongside the results.
/// Never truncated implicitly: when a cap drops candidates anywhere in the
/// pipeline the ledger still records every edge examined, and
/// [`SearchStats`](super::SearchStats) states what was dropped and why.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClueLedger {
    clues: Vec<Clue>,
}

impl ClueLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self { clues: Vec::new() }
    }

    /// Appends a clue. Clues cannot be removed or mutated afterwards.
    pub fn push(&mut self, clue: Clue) {
        self.clues.push(clue);
    }

    /// Appends every clue from `other`, preserving its discovery order.
    pub fn extend(&mut self, other: Self) {
        self.clues.extend(other.clues);
    }

    /// Returns the number of recorded clues.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.clues.len()
    }

    /// Returns whether the ledger is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.clues.is_empty()
    }

    /// Iterates over the clues in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, Clue> {
        self.clues.iter()
    }

    /// Consumes the ledger, returning the clues in discovery order.
    #[must_use]
    pub fn into_inner(self) -> Vec<Clue> {
        self.clues
    }
}

impl<'a> IntoIterator for &'a ClueLedger {
    type Item = &'a Clue;
    type IntoIter = std::slice::Iter<'a, Clue>;

    fn into_iter(self) -> Self::IntoIter {
        self.clues.iter()
    }
}
