//! Query planning.
//!
//! A [`QueryPlanner`] turns a raw query string into a [`QueryPlan`]: a query
//! embedding plus zero or more structured key terms for entity recall. Two
//! implementations are provided:
//!
//! - [`DirectQueryPlanner`] embeds the raw query and extracts no keys. This is
//!   the fast path.
//! - [`UnderstandingQueryPlanner`] consults an optional [`QueryUnderstanding`]
//!   capability (typically LLM-backed) to rewrite the query and extract key
//!   terms. Any failure of the capability degrades to the direct plan and
//!   never fails the search.
//!
//! The engine depends only on the trait; which planner runs is decided at
//! construction, not by a flag threaded through the pipeline.

use crate::embedding::Embedder;
use crate::models::EntityType;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A key term extracted from the query, with its embedding.
///
/// Key embeddings are produced at plan time so the recall stage only talks to
/// the vector index.
#[derive(Debug, Clone)]
pub struct QueryKey {
    /// The key text.
    pub text: String,
    /// Optional entity-type hint from the understanding capability.
    pub type_hint: Option<EntityType>,
    /// Embedding of the key text.
    pub embedding: Vec<f32>,
}

/// The output of query planning.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Embedding of the (possibly rewritten) query.
    pub query_embedding: Vec<f32>,
    /// Extracted key terms; empty for direct plans.
    pub keys: Vec<QueryKey>,
    /// Whether an understanding capability failed and the plan fell back to
    /// the direct path.
    pub degraded: bool,
}

/// A key term produced by the understanding capability, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedKey {
    /// The key text.
    pub text: String,
    /// Optional entity-type hint.
    pub type_hint: Option<EntityType>,
}

/// Structured output of the query-understanding capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Understanding {
    /// The rewritten query, better suited for embedding.
    pub rewritten_query: String,
    /// Extracted key terms.
    pub keys: Vec<ExtractedKey>,
}

/// Optional query-understanding capability (consumed, typically LLM-backed).
///
/// Failure of this capability must degrade, never fail, the caller: the
/// planner catches errors and falls back to the direct plan.
#[async_trait]
pub trait QueryUnderstanding: Send + Sync {
    /// The capability name, for logging.
    fn name(&self) -> &'static str;

    /// Rewrites the query and extracts key terms.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability is unavailable or fails; the caller
    /// treats this as a degradation, not a failure.
    async fn understand(&self, query: &str) -> Result<Understanding>;
}

/// Trait for query planners.
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// The planner name, for logging.
    fn name(&self) -> &'static str;

    /// Produces a plan for the given raw query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] if the query itself cannot be embedded;
    /// nothing downstream can run without a query vector.
    async fn plan(&self, query: &str) -> Result<QueryPlan>;
}

/// Planner that embeds the raw query and extracts no keys.
pub struct DirectQueryPlanner {
    embedder: Arc<dyn Embedder>,
}

impl DirectQueryPlanner {
    /// Creates a direct planner over the given embedder.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl QueryPlanner for DirectQueryPlanner {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn plan(&self, query: &str) -> Result<QueryPlan> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(QueryPlan {
            query_embedding,
            keys: Vec::new(),
            degraded: false,
        })
    }
}

/// Planner that rewrites the query and extracts keys via a
/// [`QueryUnderstanding`] capability, degrading to the direct plan on failure.
pub struct UnderstandingQueryPlanner {
    embedder: Arc<dyn Embedder>,
    understanding: Arc<dyn QueryUnderstanding>,
    /// Cap on extracted keys taken from the capability output.
    max_keys: usize,
}

impl UnderstandingQueryPlanner {
    /// Default cap on extracted key terms.
    pub const DEFAULT_MAX_KEYS: usize = 8;

    /// Creates an understanding planner.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, understanding: Arc<dyn QueryUnderstanding>) -> Self {
        Self {
            embedder,
            understanding,
            max_keys: Self::DEFAULT_MAX_KEYS,
        }
    }

    /// Sets the cap on extracted keys.
    #[must_use]
    pub const fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    async fn direct_plan(&self, query: &str, degraded: bool) -> Result<QueryPlan> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        Ok(QueryPlan {
            query_embedding,
            keys: Vec::new(),
            degraded,
        })
    }
}

#[async_trait]
impl QueryPlanner for UnderstandingQueryPlanner {
    fn name(&self) -> &'static str {
        "understanding"
    }

    async fn plan(&self, query: &str) -> Result<QueryPlan> {
        let understanding = match self.understanding.understand(query).await {
            Ok(u) => u,
            Err(e) => {
                warn!(
                    capability = self.understanding.name(),
                    error = %e,
                    "query understanding failed, degrading to direct plan"
                );
                return self.direct_plan(query, true).await;
            },
        };

        let query_embedding = self
            .embedder
            .embed(&understanding.rewritten_query)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let mut keys = Vec::new();
        for extracted in understanding.keys.into_iter().take(self.max_keys) {
            // A single failed key embedding drops that key, not the plan.
            match self.embedder.embed(&extracted.text).await {
                Ok(embedding) => keys.push(QueryKey {
                    text: extracted.text,
                    type_hint: extracted.type_hint,
                    embedding,
                }),
                Err(e) => {
                    warn!(key = %extracted.text, error = %e, "key embedding failed, skipping key");
                },
            }
        }

        debug!(keys = keys.len(), "query plan built");
        Ok(QueryPlan {
            query_embedding,
            keys,
            degraded: false,
        })
    }
}
