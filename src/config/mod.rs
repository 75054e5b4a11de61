//! Search configuration.
//!
//! One [`SearchConfig`] is constructed per call and validated before any I/O
//! runs. Invalid values are rejected with
//! [`Error::InvalidConfig`](crate::Error) rather than silently defaulted deep
//! inside the pipeline.
//!
//! # Invariants
//!
//! - every similarity/score threshold lies in `[0, 1]`
//! - every count is at least 1
//! - `max_hops >= 1` and `min_events_per_hop <= max_events_per_hop`
//! - the PageRank damping factor lies strictly between 0 and 1
//! - `rrf_k > 0`
//! - the query is non-empty and at least one scope is requested

use crate::models::ScopeId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

fn check_threshold(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

fn check_count(name: &str, value: usize) -> Result<()> {
    if value >= 1 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} must be >= 1")))
    }
}

/// Configuration for the recall stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// `top_k` for the query→event index lookup.
    pub vector_top_k: usize,
    /// Candidate pool size for each key→entity index lookup.
    pub vector_candidates: usize,
    /// Minimum similarity for key→entity matches.
    pub entity_similarity_threshold: f32,
    /// Minimum similarity for query→event matches.
    pub event_similarity_threshold: f32,
    /// Cap on merged entity seeds before the final cut.
    pub max_entities: usize,
    /// Cap on event seeds.
    pub max_events: usize,
    /// Minimum `weight * similarity` for an entity seed to survive.
    pub entity_weight_threshold: f32,
    /// Final number of entity seeds handed to expansion.
    pub final_entity_count: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 20,
            vector_candidates: 50,
            entity_similarity_threshold: 0.35,
            event_similarity_threshold: 0.25,
            max_entities: 20,
            max_events: 20,
            entity_weight_threshold: 0.2,
            final_entity_count: 10,
        }
    }
}

impl RecallConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query→event lookup size.
    #[must_use]
    pub const fn with_vector_top_k(mut self, top_k: usize) -> Self {
        self.vector_top_k = top_k;
        self
    }

    /// Sets the per-key entity candidate pool size.
    #[must_use]
    pub const fn with_vector_candidates(mut self, candidates: usize) -> Self {
        self.vector_candidates = candidates;
        self
    }

    /// Sets the entity similarity threshold.
    #[must_use]
    pub const fn with_entity_similarity_threshold(mut self, threshold: f32) -> Self {
        self.entity_similarity_threshold = threshold;
        self
    }

    /// Sets the event similarity threshold.
    #[must_use]
    pub const fn with_event_similarity_threshold(mut self, threshold: f32) -> Self {
        self.event_similarity_threshold = threshold;
        self
    }

    /// Sets the merged entity cap.
    #[must_use]
    pub const fn with_max_entities(mut self, max: usize) -> Self {
        self.max_entities = max;
        self
    }

    /// Sets the event seed cap.
    #[must_use]
    pub const fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Sets the `weight * similarity` floor for entity seeds.
    #[must_use]
    pub const fn with_entity_weight_threshold(mut self, threshold: f32) -> Self {
        self.entity_weight_threshold = threshold;
        self
    }

    /// Sets the final entity seed count.
    #[must_use]
    pub const fn with_final_entity_count(mut self, count: usize) -> Self {
        self.final_entity_count = count;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_count("recall.vector_top_k", self.vector_top_k)?;
        check_count("recall.vector_candidates", self.vector_candidates)?;
        check_count("recall.max_entities", self.max_entities)?;
        check_count("recall.max_events", self.max_events)?;
        check_count("recall.final_entity_count", self.final_entity_count)?;
        check_threshold(
            "recall.entity_similarity_threshold",
            self.entity_similarity_threshold,
        )?;
        check_threshold(
            "recall.event_similarity_threshold",
            self.event_similarity_threshold,
        )?;
        check_threshold("recall.entity_weight_threshold", self.entity_weight_threshold)
    }
}

/// Configuration for the expansion stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandConfig {
    /// Whether expansion runs at all. When false the stage is a passthrough.
    pub enabled: bool,
    /// Hard cap on traversal rounds.
    pub max_hops: u32,
    /// Frontier width: entities kept per hop.
    pub entities_per_hop: usize,
    /// Convergence floor for the per-hop activation delta.
    pub weight_change_threshold: f32,
    /// Minimum query similarity for an event reached through the graph.
    pub event_similarity_threshold: f32,
    /// Floor of the per-entity event contribution band.
    pub min_events_per_hop: usize,
    /// Ceiling of the per-entity event contribution band.
    pub max_events_per_hop: usize,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hops: 2,
            entities_per_hop: 10,
            weight_change_threshold: 0.05,
            event_similarity_threshold: 0.2,
            min_events_per_hop: 1,
            max_events_per_hop: 10,
        }
    }
}

impl ExpandConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled configuration (expansion becomes a passthrough).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets whether expansion runs.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the traversal round cap.
    #[must_use]
    pub const fn with_max_hops(mut self, hops: u32) -> Self {
        self.max_hops = hops;
        self
    }

    /// Sets the frontier width.
    #[must_use]
    pub const fn with_entities_per_hop(mut self, count: usize) -> Self {
        self.entities_per_hop = count;
        self
    }

    /// Sets the convergence floor.
    #[must_use]
    pub const fn with_weight_change_threshold(mut self, threshold: f32) -> Self {
        self.weight_change_threshold = threshold;
        self
    }

    /// Sets the event similarity floor.
    #[must_use]
    pub const fn with_event_similarity_threshold(mut self, threshold: f32) -> Self {
        self.event_similarity_threshold = threshold;
        self
    }

    /// Sets the per-entity event contribution band.
    #[must_use]
    pub const fn with_events_per_hop(mut self, min: usize, max: usize) -> Self {
        self.min_events_per_hop = min;
        self.max_events_per_hop = max;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_hops < 1 {
            return Err(Error::InvalidConfig("expand.max_hops must be >= 1".into()));
        }
        check_count("expand.entities_per_hop", self.entities_per_hop)?;
        check_count("expand.min_events_per_hop", self.min_events_per_hop)?;
        check_count("expand.max_events_per_hop", self.max_events_per_hop)?;
        if self.min_events_per_hop > self.max_events_per_hop {
            return Err(Error::InvalidConfig(format!(
                "expand.min_events_per_hop ({}) must not exceed expand.max_events_per_hop ({})",
                self.min_events_per_hop, self.max_events_per_hop
            )));
        }
        check_threshold("expand.weight_change_threshold", self.weight_change_threshold)?;
        check_threshold(
            "expand.event_similarity_threshold",
            self.event_similarity_threshold,
        )
    }
}

/// Rank-fusion strategy for the rerank stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankStrategy {
    /// Power-iteration PageRank over the candidate bipartite subgraph.
    PageRank,
    /// Reciprocal Rank Fusion of the key-weighted and query-similarity lists.
    #[default]
    Rrf,
}

impl RerankStrategy {
    /// Returns the strategy as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PageRank => "pagerank",
            Self::Rrf => "rrf",
        }
    }
}

/// Configuration for the rerank stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Which fusion strategy runs.
    pub strategy: RerankStrategy,
    /// Fused scores below this are dropped from the final list.
    pub score_threshold: f32,
    /// Cap on the returned ranked list.
    pub max_results: usize,
    /// Cap on the key-weighted list entering fusion.
    pub max_key_recall_results: usize,
    /// Cap on the query-similarity list entering fusion.
    pub max_query_recall_results: usize,
    /// Events taken from the PageRank ranking as the key-recall section.
    pub pagerank_section_top_k: usize,
    /// PageRank damping factor, strictly between 0 and 1.
    pub pagerank_damping_factor: f32,
    /// PageRank iteration cap. Hitting it is not an error.
    pub pagerank_max_iterations: u32,
    /// The `k` smoothing constant for Reciprocal Rank Fusion.
    pub rrf_k: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::Rrf,
            score_threshold: 0.0,
            max_results: 10,
            max_key_recall_results: 50,
            max_query_recall_results: 50,
            pagerank_section_top_k: 20,
            pagerank_damping_factor: 0.85,
            pagerank_max_iterations: 50,
            rrf_k: 60.0,
        }
    }
}

impl RerankConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fusion strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: RerankStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the final score floor.
    #[must_use]
    pub const fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Sets the returned result cap.
    #[must_use]
    pub const fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Sets the pre-fusion list caps.
    #[must_use]
    pub const fn with_list_caps(mut self, key: usize, query: usize) -> Self {
        self.max_key_recall_results = key;
        self.max_query_recall_results = query;
        self
    }

    /// Sets the PageRank section size.
    #[must_use]
    pub const fn with_pagerank_section_top_k(mut self, top_k: usize) -> Self {
        self.pagerank_section_top_k = top_k;
        self
    }

    /// Sets the PageRank damping factor.
    #[must_use]
    pub const fn with_pagerank_damping_factor(mut self, damping: f32) -> Self {
        self.pagerank_damping_factor = damping;
        self
    }

    /// Sets the PageRank iteration cap.
    #[must_use]
    pub const fn with_pagerank_max_iterations(mut self, iterations: u32) -> Self {
        self.pagerank_max_iterations = iterations;
        self
    }

    /// Sets the RRF smoothing constant.
    #[must_use]
    pub const fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_count("rerank.max_results", self.max_results)?;
        check_count("rerank.max_key_recall_results", self.max_key_recall_results)?;
        check_count(
            "rerank.max_query_recall_results",
            self.max_query_recall_results,
        )?;
        check_count("rerank.pagerank_section_top_k", self.pagerank_section_top_k)?;
        if self.pagerank_max_iterations < 1 {
            return Err(Error::InvalidConfig(
                "rerank.pagerank_max_iterations must be >= 1".into(),
            ));
        }
        check_threshold("rerank.score_threshold", self.score_threshold)?;
        if !(self.pagerank_damping_factor > 0.0 && self.pagerank_damping_factor < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "rerank.pagerank_damping_factor must be in (0, 1), got {}",
                self.pagerank_damping_factor
            )));
        }
        if self.rrf_k <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "rerank.rrf_k must be > 0, got {}",
                self.rrf_k
            )));
        }
        Ok(())
    }
}

/// Full configuration for one search call.
///
/// Immutable once validated; the engine never mutates it mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The raw natural-language query.
    pub query: String,
    /// The content scopes to search. Scopes' graphs are disjoint.
    pub scope_ids: Vec<ScopeId>,
    /// Recall stage configuration.
    pub recall: RecallConfig,
    /// Expansion stage configuration.
    pub expand: ExpandConfig,
    /// Rerank stage configuration.
    pub rerank: RerankConfig,
    /// Bound on concurrently running per-scope pipelines.
    pub max_concurrent_scopes: usize,
}

impl SearchConfig {
    /// Creates a configuration with default stage settings.
    #[must_use]
    pub fn new(query: impl Into<String>, scope_ids: Vec<ScopeId>) -> Self {
        Self {
            query: query.into(),
            scope_ids,
            recall: RecallConfig::default(),
            expand: ExpandConfig::default(),
            rerank: RerankConfig::default(),
            max_concurrent_scopes: 4,
        }
    }

    /// Replaces the recall configuration.
    #[must_use]
    pub fn with_recall(mut self, recall: RecallConfig) -> Self {
        self.recall = recall;
        self
    }

    /// Replaces the expansion configuration.
    #[must_use]
    pub fn with_expand(mut self, expand: ExpandConfig) -> Self {
        self.expand = expand;
        self
    }

    /// Replaces the rerank configuration.
    #[must_use]
    pub fn with_rerank(mut self, rerank: RerankConfig) -> Self {
        self.rerank = rerank;
        self
    }

    /// Sets the per-scope concurrency bound.
    #[must_use]
    pub const fn with_max_concurrent_scopes(mut self, max: usize) -> Self {
        self.max_concurrent_scopes = max;
        self
    }

    /// Validates the whole configuration tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidConfig("query must not be empty".into()));
        }
        if self.scope_ids.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one scope_id is required".into(),
            ));
        }
        check_count("max_concurrent_scopes", self.max_concurrent_scopes)?;
        self.recall.validate()?;
        self.expand.validate()?;
        self.rerank.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn valid_config() -> SearchConfig {
        SearchConfig::new("how do we deploy", vec![ScopeId::new("scope-a")])
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_query_rejected() {
        let config = SearchConfig::new("   ", vec![ScopeId::new("scope-a")]);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_no_scopes_rejected() {
        let config = SearchConfig::new("query", Vec::new());
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test_case(-0.1; "negative threshold")]
    #[test_case(1.1; "threshold above one")]
    fn test_out_of_range_threshold_rejected(value: f32) {
        let config = valid_config()
            .with_recall(RecallConfig::default().with_entity_similarity_threshold(value));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_counts_rejected() {
        let config = valid_config().with_rerank(RerankConfig::default().with_max_results(0));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = valid_config().with_expand(ExpandConfig::default().with_max_hops(0));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_event_band_rejected() {
        let config = valid_config().with_expand(ExpandConfig::default().with_events_per_hop(5, 2));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test_case(0.0; "zero damping")]
    #[test_case(1.0; "damping of one")]
    fn test_damping_factor_bounds(value: f32) {
        let config = valid_config()
            .with_rerank(RerankConfig::default().with_pagerank_damping_factor(value));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rrf_k_must_be_positive() {
        let config = valid_config().with_rerank(RerankConfig::default().with_rrf_k(0.0));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_strategy_default_is_rrf() {
        assert_eq!(RerankConfig::default().strategy, RerankStrategy::Rrf);
        assert_eq!(RerankStrategy::PageRank.as_str(), "pagerank");
    }

    #[test]
    fn test_disabled_expand_is_valid() {
        let config = valid_config().with_expand(ExpandConfig::disabled());
        assert!(config.validate().is_ok());
        assert!(!config.expand.enabled);
    }
}
