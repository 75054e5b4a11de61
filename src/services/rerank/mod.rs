//! Rerank: final scoring and ordering of the pooled candidate set.
//!
//! The rerank stage merges recall and expansion candidates (on duplicates the
//! higher incoming score wins), builds two ranked lists (a key-weighted list
//! from graph activation and a query-similarity list from direct recall) and
//! fuses them into the final ordering:
//!
//! - [`RerankStrategy::Rrf`] (default) fuses the two lists directly with
//!   Reciprocal Rank Fusion.
//! - [`RerankStrategy::PageRank`] first re-derives the key-weighted list by
//!   running power-iteration PageRank over the candidate bipartite subgraph,
//!   then fuses with the same reciprocal-rank rule.
//!
//! Ties are broken by key-list rank, then query-list rank, then event id, so
//! identical inputs always produce identical orderings.

pub mod pagerank;
pub mod rrf;

use crate::cancel::CancellationToken;
use crate::config::{RerankConfig, RerankStrategy};
use crate::models::{
    Clue, ClueLedger, ClueRelation, ClueStage, EntityId, EventId, NodeKind, ScopeId, ScoredEvent,
};
use crate::services::recall::QUERY_NODE_ID;
use crate::storage::GraphStore;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A pooled candidate event entering the rerank stage.
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    /// The event's identifier.
    pub event_id: EventId,
    /// The scope the event came from.
    pub scope_id: ScopeId,
    /// Graph activation from expansion; 0.0 for recall-only candidates.
    pub graph_weight: f32,
    /// Query similarity from recall; `None` for expansion-only candidates.
    pub query_similarity: Option<f32>,
}

/// The output of the rerank stage.
#[derive(Debug, Default)]
pub struct RerankOutcome {
    /// Final ranked events, best first.
    pub events: Vec<ScoredEvent>,
    /// Clues recorded by this stage.
    pub clues: ClueLedger,
    /// PageRank iterations run, when that strategy was selected.
    pub pagerank_iterations: Option<u32>,
    /// Whether PageRank converged before its iteration cap.
    pub pagerank_converged: Option<bool>,
    /// Distinct candidates considered after deduplication.
    pub candidates_considered: usize,
    /// Fused results dropped below the score threshold.
    pub dropped_below_threshold: usize,
    /// Fused results dropped by the `max_results` cap.
    pub dropped_by_limit: usize,
}

/// Service for the rerank stage.
pub struct RerankService {
    graph: Arc<dyn GraphStore>,
}

impl RerankService {
    /// Creates a rerank service over the given graph store.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Ranks the pooled candidate set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires, or
    /// [`Error::Storage`] if the PageRank strategy cannot fetch the candidate
    /// subgraph's edges.
    pub async fn rerank(
        &self,
        candidates: Vec<CandidateEvent>,
        entity_activations: &HashMap<EntityId, f32>,
        config: &RerankConfig,
        cancel: &CancellationToken,
    ) -> Result<RerankOutcome> {
        cancel.check()?;

        let deduped = dedup_candidates(candidates);
        let mut outcome = RerankOutcome {
            candidates_considered: deduped.len(),
            ..RerankOutcome::default()
        };
        if deduped.is_empty() {
            return Ok(outcome);
        }

        let query_list = query_similarity_list(&deduped, config.max_query_recall_results);
        let key_list = match config.strategy {
            RerankStrategy::Rrf => graph_weight_list(&deduped, config.max_key_recall_results),
            RerankStrategy::PageRank => {
                self.pagerank_list(&deduped, entity_activations, config, cancel, &mut outcome)
                    .await?
            },
        };

        let fused = rrf::fuse(&[&key_list, &query_list], config.rrf_k);

        // Tie-break order: key-list rank, query-list rank, event id.
        let key_rank: HashMap<&EventId, usize> =
            key_list.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let query_rank: HashMap<&EventId, usize> =
            query_list.iter().enumerate().map(|(i, id)| (id, i)).collect();

        let mut ranked: Vec<(EventId, f32)> = fused.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ka = key_rank.get(&a.0).copied().unwrap_or(usize::MAX);
                    let kb = key_rank.get(&b.0).copied().unwrap_or(usize::MAX);
                    ka.cmp(&kb)
                })
                .then_with(|| {
                    let qa = query_rank.get(&a.0).copied().unwrap_or(usize::MAX);
                    let qb = query_rank.get(&b.0).copied().unwrap_or(usize::MAX);
                    qa.cmp(&qb)
                })
                .then_with(|| a.0.cmp(&b.0))
        });

        for (event_id, score) in &ranked {
            outcome.clues.push(Clue {
                stage: ClueStage::Rerank,
                from_id: QUERY_NODE_ID.to_string(),
                from_kind: NodeKind::Query,
                to_id: event_id.as_str().to_string(),
                to_kind: NodeKind::Event,
                relation: ClueRelation::Ranked,
                score: *score,
                hop: 0,
            });
        }

        let before_threshold = ranked.len();
        ranked.retain(|(_, score)| *score >= config.score_threshold);
        outcome.dropped_below_threshold = before_threshold - ranked.len();

        if ranked.len() > config.max_results {
            outcome.dropped_by_limit = ranked.len() - config.max_results;
            ranked.truncate(config.max_results);
        }

        outcome.events = ranked
            .into_iter()
            .map(|(event_id, score)| {
                let scope_id = deduped
                    .get(&event_id)
                    .map_or_else(|| ScopeId::new(""), |c| c.scope_id.clone());
                ScoredEvent {
                    event_id,
                    scope_id,
                    score,
                }
            })
            .collect();

        debug!(
            strategy = config.strategy.as_str(),
            considered = outcome.candidates_considered,
            returned = outcome.events.len(),
            "rerank complete"
        );
        Ok(outcome)
    }

    /// Builds the key-recall list from PageRank over the candidate bipartite
    /// subgraph.
    async fn pagerank_list(
        &self,
        deduped: &HashMap<EventId, CandidateEvent>,
        entity_activations: &HashMap<EntityId, f32>,
        config: &RerankConfig,
        cancel: &CancellationToken,
        outcome: &mut RerankOutcome,
    ) -> Result<Vec<EventId>> {
        cancel.check()?;

        let mut event_ids: Vec<EventId> = deduped.keys().cloned().collect();
        event_ids.sort();

        let associations = self
            .graph
            .get_associations_for_events(&event_ids)
            .await
            .map_err(|e| Error::Storage {
                operation: "get_associations_for_events".to_string(),
                cause: e.to_string(),
            })?;
        cancel.check()?;

        // Dense node indexing: candidate entities first, then candidate
        // events, both in id order for determinism.
        let mut entity_ids: Vec<EntityId> = entity_activations.keys().cloned().collect();
        entity_ids.sort();
        let entity_index: HashMap<&EntityId, usize> =
            entity_ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let event_index: HashMap<&EventId, usize> = event_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id, entity_ids.len() + i))
            .collect();

        // Restricted to the candidate set: edges touching anything else are
        // outside the projection.
        let mut edges: Vec<(usize, usize, f32)> = Vec::new();
        for edge in &associations {
            let (Some(&entity), Some(&event)) = (
                entity_index.get(&edge.entity_id),
                event_index.get(&edge.event_id),
            ) else {
                continue;
            };
            edges.push((entity, event, edge.weight));
            edges.push((event, entity, edge.weight));
        }

        let entity_count = entity_ids.len();
        let node_count = entity_count + event_ids.len();
        let ranked = pagerank::power_iterate(
            &edges,
            node_count,
            config.pagerank_damping_factor,
            config.pagerank_max_iterations,
        );
        outcome.pagerank_iterations = Some(ranked.iterations);
        outcome.pagerank_converged = Some(ranked.converged);

        // Event node i sits at index entity_count + i by construction.
        let mut scored_events: Vec<(EventId, f32)> = event_ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, ranked.scores[entity_count + i]))
            .collect();
        scored_events.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut list: Vec<EventId> = scored_events
            .into_iter()
            .take(config.pagerank_section_top_k)
            .map(|(id, _)| id)
            .collect();
        list.truncate(config.max_key_recall_results);
        Ok(list)
    }
}

/// Merges duplicate candidates, keeping the higher incoming score on each
/// axis.
fn dedup_candidates(candidates: Vec<CandidateEvent>) -> HashMap<EventId, CandidateEvent> {
    let mut deduped: HashMap<EventId, CandidateEvent> = HashMap::new();
    for candidate in candidates {
        deduped
            .entry(candidate.event_id.clone())
            .and_modify(|existing| {
                existing.graph_weight = existing.graph_weight.max(candidate.graph_weight);
                existing.query_similarity = match (existing.query_similarity, candidate.query_similarity)
                {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            })
            .or_insert(candidate);
    }
    deduped
}

/// Builds the query-similarity list: recall hits, similarity-descending.
fn query_similarity_list(
    deduped: &HashMap<EventId, CandidateEvent>,
    cap: usize,
) -> Vec<EventId> {
    let mut list: Vec<(&EventId, f32)> = deduped
        .iter()
        .filter_map(|(id, c)| c.query_similarity.map(|s| (id, s)))
        .collect();
    list.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    list.into_iter().take(cap).map(|(id, _)| id.clone()).collect()
}

/// Builds the key-weighted list: graph activations, weight-descending.
fn graph_weight_list(deduped: &HashMap<EventId, CandidateEvent>, cap: usize) -> Vec<EventId> {
    let mut list: Vec<(&EventId, f32)> = deduped
        .iter()
        .filter(|(_, c)| c.graph_weight > 0.0)
        .map(|(id, c)| (id, c.graph_weight))
        .collect();
    list.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    list.into_iter().take(cap).map(|(id, _)| id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryGraphStore;

    fn scope() -> ScopeId {
        ScopeId::new("scope-a")
    }

    fn candidate(id: &str, graph_weight: f32, similarity: Option<f32>) -> CandidateEvent {
        CandidateEvent {
            event_id: EventId::new(id),
            scope_id: scope(),
            graph_weight,
            query_similarity: similarity,
        }
    }

    fn service() -> RerankService {
        RerankService::new(Arc::new(InMemoryGraphStore::new()))
    }

    /// Canonical fusion fixture: key-list `[E1, E2, E3]`, query-list `[E2, E1, E4]`,
    /// `rrf_k = 60`. E1 and E2 tie at `1/61 + 1/62`; the key-list rank breaks
    /// the tie in E1's favor, and the same rule orders the `1/63` tie between
    /// E3 and E4.
    #[tokio::test]
    async fn test_rrf_scenario_fused_order() {
        let candidates = vec![
            candidate("E1", 0.9, Some(0.7)),
            candidate("E2", 0.8, Some(0.8)),
            candidate("E3", 0.7, None),
            candidate("E4", 0.0, Some(0.5)),
        ];
        let config = RerankConfig::default().with_rrf_k(60.0).with_max_results(10);
        let outcome = service()
            .rerank(
                candidates,
                &HashMap::new(),
                &config,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let order: Vec<&str> = outcome.events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(order, vec!["E1", "E2", "E3", "E4"]);

        let e1 = outcome.events[0].score;
        let e2 = outcome.events[1].score;
        assert!((e1 - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-6);
        assert!((e1 - e2).abs() < 1e-7, "E1 and E2 tie on fused score");
    }

    #[tokio::test]
    async fn test_max_results_cap_and_drop_accounting() {
        let candidates: Vec<CandidateEvent> = (0..8)
            .map(|i| candidate(&format!("E{i}"), 0.9 - 0.1 * i as f32, None))
            .collect();
        let config = RerankConfig::default().with_max_results(3);
        let outcome = service()
            .rerank(
                candidates,
                &HashMap::new(),
                &config,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.events.len(), 3);
        assert_eq!(outcome.dropped_by_limit, 5);
        // The ledger still records every fused candidate.
        assert_eq!(outcome.clues.len(), 8);
    }

    #[tokio::test]
    async fn test_duplicate_candidates_keep_higher_scores() {
        let candidates = vec![
            candidate("E1", 0.2, Some(0.9)),
            candidate("E1", 0.8, Some(0.3)),
        ];
        let deduped = dedup_candidates(candidates);
        let merged = &deduped[&EventId::new("E1")];
        assert!((merged.graph_weight - 0.8).abs() < f32::EPSILON);
        assert!((merged.query_similarity.unwrap() - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_valid() {
        let outcome = service()
            .rerank(
                Vec::new(),
                &HashMap::new(),
                &RerankConfig::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.candidates_considered, 0);
    }

    #[tokio::test]
    async fn test_score_threshold_drops_and_counts() {
        let candidates = vec![candidate("E1", 0.9, Some(0.9)), candidate("E2", 0.1, None)];
        // Fused scores are ~1/61-scale; a threshold of 0.02 keeps only the
        // candidate present in both lists.
        let config = RerankConfig::default().with_score_threshold(0.02);
        let outcome = service()
            .rerank(
                candidates,
                &HashMap::new(),
                &config,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_id.as_str(), "E1");
        assert_eq!(outcome.dropped_below_threshold, 1);
    }

    #[tokio::test]
    async fn test_pagerank_strategy_ranks_connected_events() {
        use crate::models::{Association, Entity, EntityType};

        let graph = Arc::new(InMemoryGraphStore::new());
        graph.upsert_entity(Entity::new(EntityId::new("A"), EntityType::Concept, "A"));
        graph.upsert_entity(Entity::new(EntityId::new("B"), EntityType::Concept, "B"));
        for (event, entity, weight) in [
            ("E1", "A", 0.9_f32),
            ("E1", "B", 0.8),
            ("E2", "A", 0.3),
        ] {
            graph.insert_association(Association::new(
                EventId::new(event),
                EntityId::new(entity),
                weight,
            ));
        }

        let mut activations = HashMap::new();
        activations.insert(EntityId::new("A"), 0.9_f32);
        activations.insert(EntityId::new("B"), 0.5);

        let candidates = vec![
            candidate("E1", 0.5, Some(0.4)),
            candidate("E2", 0.4, Some(0.6)),
        ];
        let config = RerankConfig::default().with_strategy(RerankStrategy::PageRank);
        let outcome = RerankService::new(graph)
            .rerank(candidates, &activations, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.pagerank_iterations.is_some());
        assert_eq!(outcome.pagerank_converged, Some(true));
        assert_eq!(outcome.events.len(), 2);
        // E1 is the better-connected event and leads the key list; it also
        // needs the query list tie-broken, so just assert it wins overall.
        assert_eq!(outcome.events[0].event_id.as_str(), "E1");
    }

    #[tokio::test]
    async fn test_cancelled_rerank_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = service()
            .rerank(
                vec![candidate("E1", 0.9, None)],
                &HashMap::new(),
                &RerankConfig::default(),
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
