//! Recall: first-pass vector retrieval of seed candidates.
//!
//! Recall performs two independent lookups against the vector index, always
//! both, concurrently:
//!
//! 1. **Key recall**: each planned key term is matched against the entity
//!    index; candidates are merged, weighted by the entity's default
//!    importance, and cut down to a seed frontier for expansion.
//! 2. **Query recall**: the full query embedding is matched directly against
//!    the event index.
//!
//! An unreachable index is fatal ([`Error::Recall`]): nothing downstream can
//! proceed without seeds. Zero matches above threshold is a valid, non-error
//! outcome.

use crate::cancel::CancellationToken;
use crate::config::RecallConfig;
use crate::models::{
    Clue, ClueLedger, ClueRelation, ClueStage, Entity, EntityId, EventId, NodeKind, ScopeId,
};
use crate::planner::QueryPlan;
use crate::storage::{GraphStore, VectorIndex};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Identifier used as the `from_id` of query-sourced clues.
pub(crate) const QUERY_NODE_ID: &str = "query";

/// An entity seed produced by key recall.
#[derive(Debug, Clone)]
pub struct SeedEntity {
    /// The hydrated entity.
    pub entity: Entity,
    /// Best similarity across the keys that matched it.
    pub similarity: f32,
    /// Activation handed to expansion: `weight * similarity`.
    pub activation: f32,
}

/// The output of one scope's recall stage.
#[derive(Debug, Default)]
pub struct RecallOutput {
    /// Entity seeds, activation-descending.
    pub entities: Vec<SeedEntity>,
    /// Event seeds with query similarity, similarity-descending.
    pub events: Vec<(EventId, f32)>,
    /// Clues recorded by this stage.
    pub clues: ClueLedger,
}

/// Service for the recall stage.
pub struct RecallService {
    index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
}

impl RecallService {
    /// Creates a recall service over the given collaborators.
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, graph: Arc<dyn GraphStore>) -> Self {
        Self { index, graph }
    }

    /// Runs both recall lookups for one scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recall`] if the vector index is unreachable,
    /// [`Error::Storage`] if seed hydration fails, or [`Error::Cancelled`].
    pub async fn recall(
        &self,
        plan: &QueryPlan,
        scope_id: &ScopeId,
        config: &RecallConfig,
        cancel: &CancellationToken,
    ) -> Result<RecallOutput> {
        cancel.check()?;

        let scopes = std::slice::from_ref(scope_id);
        let (key_hits, event_hits) = tokio::join!(
            self.key_recall(plan, scopes, config),
            self.event_recall(plan, scopes, config),
        );
        let key_hits = key_hits?;
        let event_hits = event_hits?;
        cancel.check()?;

        let mut clues = ClueLedger::new();

        // Every index hit is recorded before any cap is applied.
        let entities = self
            .hydrate_entities(key_hits, scope_id, config, cancel, &mut clues)
            .await?;

        for (id, similarity) in &event_hits {
            clues.push(Clue {
                stage: ClueStage::Recall,
                from_id: QUERY_NODE_ID.to_string(),
                from_kind: NodeKind::Query,
                to_id: id.as_str().to_string(),
                to_kind: NodeKind::Event,
                relation: ClueRelation::SimilarTo,
                score: *similarity,
                hop: 0,
            });
        }

        let mut events = event_hits;
        events.truncate(config.max_events);

        debug!(
            scope = %scope_id,
            entities = entities.len(),
            events = events.len(),
            "recall complete"
        );

        Ok(RecallOutput {
            entities,
            events,
            clues,
        })
    }

    /// Runs entity recall across all planned keys, merging per-entity on the
    /// best similarity.
    async fn key_recall(
        &self,
        plan: &QueryPlan,
        scopes: &[ScopeId],
        config: &RecallConfig,
    ) -> Result<Vec<(EntityId, f32)>> {
        let mut merged: HashMap<EntityId, f32> = HashMap::new();
        for key in &plan.keys {
            let hits = self
                .index
                .search_entities(
                    scopes,
                    &key.embedding,
                    config.max_entities,
                    config.vector_candidates,
                    config.entity_similarity_threshold,
                )
                .await
                .map_err(|e| Error::Recall {
                    scope: scopes[0].clone(),
                    cause: e.to_string(),
                })?;
            for (id, similarity) in hits {
                merged
                    .entry(id)
                    .and_modify(|best| *best = best.max(similarity))
                    .or_insert(similarity);
            }
        }

        // Deterministic hydration order regardless of map iteration.
        let mut hits: Vec<(EntityId, f32)> = merged.into_iter().collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(hits)
    }

    /// Runs query→event recall.
    async fn event_recall(
        &self,
        plan: &QueryPlan,
        scopes: &[ScopeId],
        config: &RecallConfig,
    ) -> Result<Vec<(EventId, f32)>> {
        self.index
            .search_events(
                scopes,
                &plan.query_embedding,
                config.vector_top_k,
                config.event_similarity_threshold,
            )
            .await
            .map_err(|e| Error::Recall {
                scope: scopes[0].clone(),
                cause: e.to_string(),
            })
    }

    /// Hydrates matched entities from the graph store, applies the
    /// weight-scaled threshold and the two-step truncation.
    async fn hydrate_entities(
        &self,
        hits: Vec<(EntityId, f32)>,
        scope_id: &ScopeId,
        config: &RecallConfig,
        cancel: &CancellationToken,
        clues: &mut ClueLedger,
    ) -> Result<Vec<SeedEntity>> {
        let mut seeds = Vec::with_capacity(hits.len());
        for (id, similarity) in hits {
            cancel.check()?;
            let Some(entity) = self
                .graph
                .get_entity(&id)
                .await
                .map_err(|e| Error::Storage {
                    operation: "get_entity".to_string(),
                    cause: e.to_string(),
                })?
            else {
                // Index/store drift: the index knows a vector the store no
                // longer holds. The candidate cannot be weighted, so skip it.
                debug!(scope = %scope_id, entity = %id, "indexed entity missing from graph store");
                continue;
            };

            clues.push(Clue {
                stage: ClueStage::Recall,
                from_id: QUERY_NODE_ID.to_string(),
                from_kind: NodeKind::Query,
                to_id: entity.id.as_str().to_string(),
                to_kind: NodeKind::Entity,
                relation: ClueRelation::SimilarTo,
                score: similarity,
                hop: 0,
            });

            let activation = entity.weight * similarity;
            if activation < config.entity_weight_threshold {
                continue;
            }
            seeds.push(SeedEntity {
                entity,
                similarity,
                activation,
            });
        }

        seeds.sort_by(|a, b| {
            b.activation
                .partial_cmp(&a.activation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });
        seeds.truncate(config.max_entities);
        seeds.truncate(config.final_entity_count);
        Ok(seeds)
    }
}
