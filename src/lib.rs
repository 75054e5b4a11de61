//! # Engram
//!
//! A knowledge-graph retrieval and ranking engine for extracted events.
//!
//! Engram answers natural-language queries against a previously extracted
//! entity/event graph. A search runs a three-stage pipeline: vector **recall**
//! of seed candidates, bounded multi-hop graph **expansion**, and a final
//! **rerank** pass (Reciprocal Rank Fusion or bipartite PageRank). It returns
//! ranked event identifiers together with a provenance trail of clues
//! explaining how each result was reached.
//!
//! ## Features
//!
//! - Pluggable collaborators (embedding provider, vector index, graph store,
//!   optional query-understanding capability) injected as trait objects
//! - Deterministic ranking with explicit tie-break rules
//! - Append-only clue ledger for result explainability
//! - Concurrent per-scope pipelines with a bounded concurrency limit
//! - Cooperative cancellation checked at every suspension point
//!
//! ## Example
//!
//! ```rust,ignore
//! use engram::{SearchConfig, SearchService};
//!
//! let service = SearchService::new(planner, index, graph);
//! let config = SearchConfig::new("database migration rollback", vec![scope]);
//! let result = service.search(&config).await?;
//!
//! for hit in &result.events {
//!     println!("{}: {:.4}", hit.event_id, hit.score);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cancel;
pub mod config;
pub mod embedding;
pub mod models;
pub mod planner;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use cancel::CancellationToken;
pub use config::{ExpandConfig, RecallConfig, RerankConfig, RerankStrategy, SearchConfig};
pub use embedding::Embedder;
pub use models::{
    Association, Clue, ClueLedger, ClueRelation, ClueStage, Entity, EntityId, EntityType, Event,
    EventId, NodeKind, ScopeId, ScoredEvent, SearchResult, SearchStats,
};
pub use planner::{DirectQueryPlanner, QueryPlan, QueryPlanner, UnderstandingQueryPlanner};
pub use services::SearchService;
pub use storage::{GraphStore, InMemoryGraphStore, InMemoryVectorIndex, VectorIndex};

/// Error type for engram operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidConfig` | A threshold outside `[0,1]`, a zero count, an empty query/scope list |
/// | `Embedding` | The embedding provider fails for the query text |
/// | `Recall` | The vector index is unreachable during seed recall |
/// | `Storage` | The graph store fails while hydrating recall seeds |
/// | `AllScopesFailed` | Every requested scope failed during recall/expand |
/// | `Cancelled` | The cancellation token fired or the deadline passed |
///
/// Algorithmic edge cases (zero candidates, an empty graph, a PageRank run
/// that hits its iteration cap) are *not* errors. They produce a valid
/// [`SearchResult`] with an explanatory [`SearchStats`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration was rejected at validation.
    ///
    /// Raised when:
    /// - A similarity or score threshold falls outside `[0,1]`
    /// - A count field is zero (`max_results`, `max_entities`, ...)
    /// - `max_hops` is zero or `min_events_per_hop > max_events_per_hop`
    /// - The query is empty or no scope was requested
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Embedding generation failed for the query.
    ///
    /// Fatal: nothing downstream can run without a query vector.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector index could not serve a recall lookup.
    ///
    /// Fatal for the affected scope: recall produces the seeds every later
    /// stage consumes. In a multi-scope search the scope is marked degraded
    /// and the call only fails when every scope fails.
    #[error("recall failed for scope '{scope}': {cause}")]
    Recall {
        /// The scope whose lookup failed.
        scope: ScopeId,
        /// The underlying cause.
        cause: String,
    },

    /// A graph-store operation failed where the pipeline cannot proceed.
    ///
    /// Raised when seed entities cannot be hydrated during recall. Mid-hop
    /// expansion failures are non-fatal and recorded in stats instead.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Every requested scope failed.
    ///
    /// Raised by the multi-source orchestrator when no scope produced
    /// candidates; individual causes are preserved in request order.
    #[error("all {} scope(s) failed: {}", causes.len(), causes.join("; "))]
    AllScopesFailed {
        /// Per-scope failure causes, in request order.
        causes: Vec<String>,
    },

    /// The call was cancelled.
    ///
    /// A cancelled call never returns a partial result: the candidate graph
    /// and clue ledger built so far are discarded in full.
    #[error("search cancelled")]
    Cancelled,
}

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("max_results must be >= 1".to_string());
        assert_eq!(err.to_string(), "invalid config: max_results must be >= 1");

        let err = Error::Recall {
            scope: ScopeId::new("workspace-a"),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "recall failed for scope 'workspace-a': connection refused"
        );

        let err = Error::AllScopesFailed {
            causes: vec!["timeout".to_string(), "refused".to_string()],
        };
        assert_eq!(err.to_string(), "all 2 scope(s) failed: timeout; refused");
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(Error::Cancelled.to_string(), "search cancelled");
    }
}
