//! Search result and statistics types.

use super::{Clue, EventId, ScopeId};
use serde::{Deserialize, Serialize};

/// One ranked event reference in a search result.
///
/// Carries stable identifiers and the final score only; hydrating full event
/// content for display is the consumer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEvent {
    /// The event's stable identifier.
    pub event_id: EventId,
    /// The scope the event belongs to.
    pub scope_id: ScopeId,
    /// Final score assigned by the rerank stage.
    pub score: f32,
}

/// Statistics describing how a search ran.
///
/// Degradations and algorithmic edge cases that are not errors (an empty
/// candidate pool, an expansion stopped early, a PageRank run that hit its
/// iteration cap) are reported here rather than raised.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Whether the query-understanding capability failed and the plan
    /// degraded to direct query-embedding recall.
    pub planner_degraded: bool,
    /// Seed entities produced by recall, across all scopes.
    pub recall_entities: usize,
    /// Seed events produced by recall, across all scopes.
    pub recall_events: usize,
    /// Entities discovered by expansion, across all scopes.
    pub expand_entities: usize,
    /// Events discovered by expansion, across all scopes.
    pub expand_events: usize,
    /// Traversal hops actually run (maximum over scopes).
    pub expand_hops: u32,
    /// Whether expansion stopped because the weight delta converged.
    pub expand_converged: bool,
    /// Causes of non-fatal expansion failures, in scope request order.
    pub expansion_errors: Vec<String>,
    /// PageRank iterations run, when the pagerank strategy was used.
    pub pagerank_iterations: Option<u32>,
    /// Whether PageRank converged before its iteration cap. `Some(false)`
    /// means the cap was hit and the last computed scores were used.
    pub pagerank_converged: Option<bool>,
    /// Distinct candidate events considered by the rerank stage.
    pub candidates_considered: usize,
    /// Results dropped because their fused score fell below the threshold.
    pub dropped_below_threshold: usize,
    /// Results dropped by the `max_results` cap.
    pub dropped_by_limit: usize,
    /// Scopes whose pipeline failed entirely, with causes, in request order.
    pub degraded_scopes: Vec<(ScopeId, String)>,
}

/// The result envelope returned by every successful search.
///
/// Created once at the end of the rerank stage; never partially mutated or
/// returned mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ranked events, best first.
    pub events: Vec<ScoredEvent>,
    /// The full provenance ledger, in discovery order.
    pub clues: Vec<Clue>,
    /// How the search ran.
    pub stats: SearchStats,
}

impl SearchResult {
    /// Returns the number of ranked events.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns whether the result is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
