//! Expand: bounded multi-hop traversal of the association graph.
//!
//! Expansion grows the recall seed set by walking entity↔event association
//! edges for at most `max_hops` rounds. Each hop:
//!
//! 1. fetches the events associated with the current entity frontier, scores
//!    them against the query embedding and clamps each entity's contribution
//!    into the configured `[min, max]` band;
//! 2. discovers not-yet-visited entities through those events, weighting each
//!    candidate by `edge_weight * event_relevance * decay(hop)` and keeping
//!    the strongest `entities_per_hop` as the next frontier.
//!
//! The visited set is keyed by entity id, so cyclic graphs terminate. When an
//! entity is reached over several paths its activation is the **maximum**
//! across paths, never the sum: hub entities must not inflate. The loop stops
//! early when the per-hop activation delta falls below
//! `weight_change_threshold`, when the frontier empties, and unconditionally
//! at `max_hops`.
//!
//! A mid-hop fetch failure is non-fatal: expansion stops, keeps what it has
//! gathered, and reports the cause through [`ExpandOutput::error`].

use crate::cancel::CancellationToken;
use crate::config::ExpandConfig;
use crate::models::{
    Association, Clue, ClueLedger, ClueRelation, ClueStage, EntityId, EventId, NodeKind, ScopeId,
};
use crate::Result;
use crate::services::recall::SeedEntity;
use crate::storage::{GraphStore, VectorIndex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Hop-distance decay applied to discovered entity weights.
fn decay(hop: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    {
        1.0 / (1.0 + hop as f32)
    }
}

/// An event surfaced by expansion.
#[derive(Debug, Clone)]
pub struct ExpandedEvent {
    /// The event's identifier.
    pub event_id: EventId,
    /// Query relevance (similarity of the event to the query embedding).
    pub relevance: f32,
    /// Graph activation: best `entity_activation * edge_weight * relevance`
    /// over the paths that reached it.
    pub weight: f32,
    /// The hop at which the event was first reached.
    pub hop: u32,
}

/// The output of one scope's expansion stage.
#[derive(Debug, Default)]
pub struct ExpandOutput {
    /// Final activations for every candidate entity (seeds included).
    pub entity_activations: HashMap<EntityId, f32>,
    /// Entities discovered by traversal (excludes seeds).
    pub discovered_entities: usize,
    /// Events surfaced by traversal, in deterministic (id) order.
    pub events: Vec<ExpandedEvent>,
    /// Clues recorded by this stage.
    pub clues: ClueLedger,
    /// Traversal rounds actually run.
    pub hops_run: u32,
    /// Whether the loop stopped because the activation delta converged.
    pub converged: bool,
    /// Cause of a non-fatal mid-hop failure, if expansion stopped early.
    pub error: Option<String>,
}

/// Service for the expansion stage.
pub struct ExpandService {
    index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
}

impl ExpandService {
    /// Creates an expand service over the given collaborators.
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, graph: Arc<dyn GraphStore>) -> Self {
        Self { index, graph }
    }

    /// Expands the seed frontier for one scope.
    ///
    /// With expansion disabled or no seeds this is a passthrough that only
    /// carries the seed activations forward.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires; infrastructure
    /// failures mid-hop are reported through [`ExpandOutput::error`] instead.
    pub async fn expand(
        &self,
        query_embedding: &[f32],
        seeds: &[SeedEntity],
        scope_id: &ScopeId,
        config: &ExpandConfig,
        cancel: &CancellationToken,
    ) -> Result<ExpandOutput> {
        let mut output = ExpandOutput::default();
        for seed in seeds {
            output
                .entity_activations
                .insert(seed.entity.id.clone(), seed.activation);
        }
        if !config.enabled || seeds.is_empty() {
            return Ok(output);
        }

        let scopes = std::slice::from_ref(scope_id);
        let mut visited: HashSet<EntityId> =
            seeds.iter().map(|s| s.entity.id.clone()).collect();
        // Seeds arrive activation-descending from recall; keep that order.
        let mut frontier: Vec<EntityId> = seeds.iter().map(|s| s.entity.id.clone()).collect();
        let mut events: HashMap<EventId, ExpandedEvent> = HashMap::new();
        let mut relevance_cache: HashMap<EventId, f32> = HashMap::new();

        for hop in 1..=config.max_hops {
            if frontier.is_empty() {
                break;
            }
            cancel.check()?;
            output.hops_run = hop;

            let edges = match self.graph.get_associations_for_entities(&frontier).await {
                Ok(edges) => edges,
                Err(e) => {
                    warn!(scope = %scope_id, hop, error = %e, "expansion fetch failed, stopping early");
                    output.error = Some(format!("hop {hop}: {e}"));
                    break;
                },
            };

            if let Err(e) = self
                .score_new_events(&edges, query_embedding, scopes, &mut relevance_cache)
                .await
            {
                warn!(scope = %scope_id, hop, error = %e, "event scoring failed, stopping early");
                output.error = Some(format!("hop {hop}: {e}"));
                break;
            }
            cancel.check()?;

            let hop_events = collect_hop_events(
                &frontier,
                &edges,
                &relevance_cache,
                &output.entity_activations,
                config,
                hop,
                &mut events,
                &mut output.clues,
            );
            if hop_events.is_empty() {
                break;
            }

            let back_edges = match self.graph.get_associations_for_events(&hop_events).await {
                Ok(edges) => edges,
                Err(e) => {
                    warn!(scope = %scope_id, hop, error = %e, "discovery fetch failed, stopping early");
                    output.error = Some(format!("hop {hop}: {e}"));
                    break;
                },
            };

            let delta = discover_entities(
                &back_edges,
                &relevance_cache,
                config,
                hop,
                &mut visited,
                &mut frontier,
                &mut output.entity_activations,
                &mut output.clues,
            );

            debug!(scope = %scope_id, hop, delta, frontier = frontier.len(), "hop complete");
            if delta < config.weight_change_threshold {
                output.converged = true;
                break;
            }
        }

        output.discovered_entities = output.entity_activations.len() - seeds.len();
        output.events = sorted_events(events);
        debug!(
            scope = %scope_id,
            hops = output.hops_run,
            converged = output.converged,
            events = output.events.len(),
            discovered = output.discovered_entities,
            "expansion complete"
        );
        Ok(output)
    }

    /// Scores events not yet in the relevance cache against the query.
    async fn score_new_events(
        &self,
        edges: &[Association],
        query_embedding: &[f32],
        scopes: &[ScopeId],
        cache: &mut HashMap<EventId, f32>,
    ) -> Result<()> {
        let mut unscored: Vec<EventId> = edges
            .iter()
            .map(|e| e.event_id.clone())
            .filter(|id| !cache.contains_key(id))
            .collect();
        unscored.sort();
        unscored.dedup();
        if unscored.is_empty() {
            return Ok(());
        }

        let scores = self
            .index
            .score_events(scopes, query_embedding, &unscored)
            .await?;
        for (id, relevance) in scores {
            cache.insert(id, relevance);
        }
        // Events the index does not know score zero relevance.
        for id in unscored {
            cache.entry(id).or_insert(0.0);
        }
        Ok(())
    }
}

/// Selects each frontier entity's event contribution for this hop and folds
/// it into the accumulated event set. Returns the distinct events touched.
#[allow(clippy::too_many_arguments)]
fn collect_hop_events(
    frontier: &[EntityId],
    edges: &[Association],
    relevance: &HashMap<EventId, f32>,
    activations: &HashMap<EntityId, f32>,
    config: &ExpandConfig,
    hop: u32,
    events: &mut HashMap<EventId, ExpandedEvent>,
    clues: &mut ClueLedger,
) -> Vec<EventId> {
    let mut touched: Vec<EventId> = Vec::new();

    for entity_id in frontier {
        // Store contract: edges arrive weight-descending.
        let entity_edges: Vec<&Association> =
            edges.iter().filter(|e| &e.entity_id == entity_id).collect();
        if entity_edges.is_empty() {
            continue;
        }

        let eligible: Vec<&Association> = entity_edges
            .iter()
            .copied()
            .filter(|e| {
                relevance.get(&e.event_id).copied().unwrap_or(0.0)
                    >= config.event_similarity_threshold
            })
            .collect();

        // Clamp the contribution into the [min, max] band: backfill by edge
        // weight when the relevance filter leaves too few.
        let mut chosen = eligible;
        if chosen.len() < config.min_events_per_hop {
            for &edge in &entity_edges {
                if chosen.len() >= config.min_events_per_hop {
                    break;
                }
                if !chosen.iter().any(|c| c.event_id == edge.event_id) {
                    chosen.push(edge);
                }
            }
        }
        chosen.truncate(config.max_events_per_hop);

        let activation = activations.get(entity_id).copied().unwrap_or(0.0);
        for edge in chosen {
            let rel = relevance.get(&edge.event_id).copied().unwrap_or(0.0);
            let weight = activation * edge.weight * rel;

            clues.push(Clue {
                stage: ClueStage::Expand,
                from_id: entity_id.as_str().to_string(),
                from_kind: NodeKind::Entity,
                to_id: edge.event_id.as_str().to_string(),
                to_kind: NodeKind::Event,
                relation: ClueRelation::Mentions,
                score: edge.weight,
                hop,
            });

            events
                .entry(edge.event_id.clone())
                .and_modify(|existing| {
                    // Best path wins; first hop of discovery is kept.
                    existing.weight = existing.weight.max(weight);
                })
                .or_insert_with(|| ExpandedEvent {
                    event_id: edge.event_id.clone(),
                    relevance: rel,
                    weight,
                    hop,
                });
            touched.push(edge.event_id.clone());
        }
    }

    touched.sort();
    touched.dedup();
    touched
}

/// Discovers entities through this hop's events, applying max-across-paths
/// accumulation, and advances the frontier. Returns the activation delta.
#[allow(clippy::too_many_arguments)]
fn discover_entities(
    back_edges: &[Association],
    relevance: &HashMap<EventId, f32>,
    config: &ExpandConfig,
    hop: u32,
    visited: &mut HashSet<EntityId>,
    frontier: &mut Vec<EntityId>,
    activations: &mut HashMap<EntityId, f32>,
    clues: &mut ClueLedger,
) -> f32 {
    let mut candidates: HashMap<EntityId, f32> = HashMap::new();
    let mut delta = 0.0_f32;

    for edge in back_edges {
        let rel = relevance.get(&edge.event_id).copied().unwrap_or(0.0);
        let weight = edge.weight * rel * decay(hop);

        if visited.contains(&edge.entity_id) {
            // Re-reached over a new path: activation may only move up to the
            // path maximum, and the movement counts toward the hop delta.
            if let Some(existing) = activations.get_mut(&edge.entity_id)
                && weight > *existing
            {
                delta += weight - *existing;
                *existing = weight;
            }
            continue;
        }

        clues.push(Clue {
            stage: ClueStage::Expand,
            from_id: edge.event_id.as_str().to_string(),
            from_kind: NodeKind::Event,
            to_id: edge.entity_id.as_str().to_string(),
            to_kind: NodeKind::Entity,
            relation: ClueRelation::MentionedBy,
            score: weight,
            hop,
        });

        candidates
            .entry(edge.entity_id.clone())
            .and_modify(|best| *best = best.max(weight))
            .or_insert(weight);
    }

    // Strongest candidates form the next frontier.
    let mut ranked: Vec<(EntityId, f32)> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(config.entities_per_hop);

    frontier.clear();
    for (entity_id, weight) in ranked {
        delta += weight;
        visited.insert(entity_id.clone());
        activations.insert(entity_id.clone(), weight);
        frontier.push(entity_id);
    }
    delta
}

/// Returns the accumulated events in deterministic id order.
fn sorted_events(events: HashMap<EventId, ExpandedEvent>) -> Vec<ExpandedEvent> {
    let mut out: Vec<ExpandedEvent> = events.into_values().collect();
    out.sort_by(|a, b| a.event_id.cmp(&b.event_id));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::{Entity, EntityType, Event};
    use crate::storage::{InMemoryGraphStore, InMemoryVectorIndex};

    fn scope() -> ScopeId {
        ScopeId::new("scope-a")
    }

    fn seed(id: &str, weight: f32, similarity: f32) -> SeedEntity {
        let entity =
            Entity::new(EntityId::new(id), EntityType::Concept, id).with_weight(weight);
        SeedEntity {
            entity,
            similarity,
            activation: weight * similarity,
        }
    }

    /// Builds a two-entity fixture: A(.9/.8), B(.6/.7) with edges
    /// A–E1(.9), A–E2(.5), B–E2(.7), B–E3(.6). Every event vector equals the
    /// query vector so relevance is 1.0.
    fn scenario_a() -> (Arc<InMemoryVectorIndex>, Arc<InMemoryGraphStore>) {
        let index = Arc::new(InMemoryVectorIndex::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        for event in ["E1", "E2", "E3"] {
            graph.upsert_event(Event::new(EventId::new(event), scope(), event, "", ""));
            index.upsert_event(scope(), EventId::new(event), vec![1.0, 0.0]);
        }
        for (event, entity, weight) in [
            ("E1", "A", 0.9_f32),
            ("E2", "A", 0.5),
            ("E2", "B", 0.7),
            ("E3", "B", 0.6),
        ] {
            graph.insert_association(Association::new(
                EventId::new(event),
                EntityId::new(entity),
                weight,
            ));
        }
        (index, graph)
    }

    fn config() -> ExpandConfig {
        ExpandConfig::default()
            .with_max_hops(1)
            .with_entities_per_hop(5)
            .with_weight_change_threshold(0.05)
            .with_event_similarity_threshold(0.2)
            .with_events_per_hop(1, 10)
    }

    #[tokio::test]
    async fn test_scenario_a_surfaces_all_events_and_converges() {
        let (index, graph) = scenario_a();
        let service = ExpandService::new(index, graph);
        let seeds = vec![seed("A", 0.9, 0.8), seed("B", 0.6, 0.7)];

        let output = service
            .expand(&[1.0, 0.0], &seeds, &scope(), &config(), &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = output.events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2", "E3"]);
        assert_eq!(output.discovered_entities, 0);
        assert!(output.converged);
        assert_eq!(output.hops_run, 1);
    }

    #[tokio::test]
    async fn test_multi_path_event_takes_max_not_sum() {
        let (index, graph) = scenario_a();
        let service = ExpandService::new(index, graph);
        let seeds = vec![seed("A", 0.9, 0.8), seed("B", 0.6, 0.7)];

        let output = service
            .expand(&[1.0, 0.0], &seeds, &scope(), &config(), &CancellationToken::new())
            .await
            .unwrap();

        // E2 is reachable from A (.72 * .5) and B (.42 * .7); max path wins.
        let e2 = output
            .events
            .iter()
            .find(|e| e.event_id.as_str() == "E2")
            .unwrap();
        let expected = (0.42_f32 * 0.7).max(0.72 * 0.5);
        assert!((e2.weight - expected).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_disabled_expansion_is_passthrough() {
        let (index, graph) = scenario_a();
        let service = ExpandService::new(index, graph);
        let seeds = vec![seed("A", 0.9, 0.8)];

        let output = service
            .expand(
                &[1.0, 0.0],
                &seeds,
                &scope(),
                &ExpandConfig::disabled(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.events.is_empty());
        assert_eq!(output.hops_run, 0);
        assert_eq!(output.entity_activations.len(), 1);
    }

    #[tokio::test]
    async fn test_cyclic_graph_terminates_at_max_hops() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        // A ring: ent-0 – evt-0 – ent-1 – evt-1 – ent-2 – evt-2 – ent-0.
        for i in 0..3 {
            let event = EventId::new(format!("evt-{i}"));
            graph.upsert_event(Event::new(event.clone(), scope(), "", "", ""));
            index.upsert_event(scope(), event.clone(), vec![1.0, 0.0]);
            graph.insert_association(Association::new(
                event.clone(),
                EntityId::new(format!("ent-{i}")),
                0.9,
            ));
            graph.insert_association(Association::new(
                event,
                EntityId::new(format!("ent-{}", (i + 1) % 3)),
                0.9,
            ));
        }

        let service = ExpandService::new(index, graph);
        let seeds = vec![seed("ent-0", 1.0, 1.0)];
        let config = ExpandConfig::default()
            .with_max_hops(10)
            .with_weight_change_threshold(0.0)
            .with_event_similarity_threshold(0.0);

        let output = service
            .expand(&[1.0, 0.0], &seeds, &scope(), &config, &CancellationToken::new())
            .await
            .unwrap();

        // Every entity is visited once; the ring never loops.
        assert!(output.hops_run <= 10);
        assert_eq!(output.entity_activations.len(), 3);
        assert_eq!(output.events.len(), 3);
    }

    #[tokio::test]
    async fn test_relevance_filter_respects_min_band() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        // Two events: one orthogonal to the query (relevance 0), one aligned.
        graph.upsert_event(Event::new(EventId::new("evt-far"), scope(), "", "", ""));
        index.upsert_event(scope(), EventId::new("evt-far"), vec![0.0, 1.0]);
        graph.upsert_event(Event::new(EventId::new("evt-near"), scope(), "", "", ""));
        index.upsert_event(scope(), EventId::new("evt-near"), vec![1.0, 0.0]);
        graph.insert_association(Association::new(
            EventId::new("evt-far"),
            EntityId::new("A"),
            0.9,
        ));
        graph.insert_association(Association::new(
            EventId::new("evt-near"),
            EntityId::new("A"),
            0.3,
        ));

        let service = ExpandService::new(index, graph);
        let seeds = vec![seed("A", 1.0, 1.0)];
        let config = ExpandConfig::default()
            .with_max_hops(1)
            .with_event_similarity_threshold(0.5)
            .with_events_per_hop(1, 10);

        let output = service
            .expand(&[1.0, 0.0], &seeds, &scope(), &config, &CancellationToken::new())
            .await
            .unwrap();

        // evt-far fails the filter but the aligned event satisfies the floor.
        let ids: Vec<&str> = output.events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["evt-near"]);
    }

    #[tokio::test]
    async fn test_cancelled_expansion_returns_cancelled() {
        let (index, graph) = scenario_a();
        let service = ExpandService::new(index, graph);
        let seeds = vec![seed("A", 0.9, 0.8)];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = service
            .expand(&[1.0, 0.0], &seeds, &scope(), &config(), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
