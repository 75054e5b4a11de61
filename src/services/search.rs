//! The search entry point and multi-source orchestrator.
//!
//! [`SearchService`] owns the injected collaborators and drives the pipeline:
//! plan → per-scope recall+expand → pooled rerank. Stage ordering is strictly
//! sequential; concurrency exists only inside recall (its two lookups) and
//! across scopes, where per-scope pipelines run under a semaphore bound so a
//! wide multi-scope search cannot saturate the vector index backend.
//!
//! Scopes' graphs are disjoint, so pooling simply concatenates candidates in
//! request order before the single rerank pass (merge-then-rank). A scope
//! whose pipeline fails is marked degraded in the stats; the call fails only
//! when every scope fails.

use crate::cancel::CancellationToken;
use crate::config::{ExpandConfig, RecallConfig, SearchConfig};
use crate::models::{ClueLedger, EntityId, ScopeId, SearchResult, SearchStats};
use crate::planner::{QueryPlan, QueryPlanner};
use crate::services::expand::{ExpandOutput, ExpandService};
use crate::services::recall::{RecallOutput, RecallService};
use crate::services::rerank::{CandidateEvent, RerankService};
use crate::storage::{GraphStore, VectorIndex};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// The per-scope pipeline product pooled before rerank.
struct ScopeHarvest {
    scope_id: ScopeId,
    recall: RecallOutput,
    expand: ExpandOutput,
}

/// The knowledge-graph search engine.
///
/// Holds no mutable state of its own: every call builds a private candidate
/// graph, visited set and clue ledger, and discards them when the call ends.
/// Collaborators are injected once at construction; there are no hidden
/// globals.
pub struct SearchService {
    planner: Arc<dyn QueryPlanner>,
    index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
}

impl SearchService {
    /// Creates a search service over the given collaborators.
    #[must_use]
    pub fn new(
        planner: Arc<dyn QueryPlanner>,
        index: Arc<dyn VectorIndex>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            planner,
            index,
            graph,
        }
    }

    /// Runs a search to completion.
    ///
    /// # Errors
    ///
    /// See [`search_with_cancellation`](Self::search_with_cancellation).
    pub async fn search(&self, config: &SearchConfig) -> Result<SearchResult> {
        self.search_with_cancellation(config, &CancellationToken::new())
            .await
    }

    /// Runs a search under a cancellation token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] before any I/O for invalid
    /// configuration, [`Error::Embedding`] when the query cannot be embedded,
    /// [`Error::Recall`]/[`Error::Storage`] for fatal single-scope
    /// infrastructure failures, [`Error::AllScopesFailed`] when every scope
    /// of a multi-scope search fails, and [`Error::Cancelled`] when the token
    /// fires, in which case no partial result is returned.
    pub async fn search_with_cancellation(
        &self,
        config: &SearchConfig,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        config.validate()?;
        cancel.check()?;

        let plan = Arc::new(self.planner.plan(&config.query).await?);
        cancel.check()?;

        let harvests = self.run_scopes(config, &plan, cancel).await?;
        cancel.check()?;

        let mut stats = SearchStats {
            planner_degraded: plan.degraded,
            ..SearchStats::default()
        };
        let mut ledger = ClueLedger::new();
        let mut candidates: Vec<CandidateEvent> = Vec::new();
        let mut activations: HashMap<EntityId, f32> = HashMap::new();
        let mut failures: Vec<(ScopeId, Error)> = Vec::new();
        let mut expansion_ran = false;
        let mut expansion_converged = true;

        for (scope_id, outcome) in harvests {
            match outcome {
                Ok(harvest) => {
                    pool_harvest(
                        harvest,
                        &mut stats,
                        &mut ledger,
                        &mut candidates,
                        &mut activations,
                        &mut expansion_ran,
                        &mut expansion_converged,
                    );
                },
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(scope = %scope_id, error = %e, "scope pipeline failed");
                    failures.push((scope_id, e));
                },
            }
        }
        stats.expand_converged = expansion_ran && expansion_converged;

        if failures.len() == config.scope_ids.len() {
            // Nothing survived. A single-scope search surfaces its own error;
            // a multi-scope search aggregates the causes.
            if failures.len() == 1 {
                return Err(failures.remove(0).1);
            }
            return Err(Error::AllScopesFailed {
                causes: failures
                    .into_iter()
                    .map(|(scope, e)| format!("{scope}: {e}"))
                    .collect(),
            });
        }
        for (scope, error) in failures {
            stats.degraded_scopes.push((scope, error.to_string()));
        }

        cancel.check()?;
        let rerank = RerankService::new(Arc::clone(&self.graph));
        let outcome = rerank
            .rerank(candidates, &activations, &config.rerank, cancel)
            .await?;

        ledger.extend(outcome.clues);
        stats.pagerank_iterations = outcome.pagerank_iterations;
        stats.pagerank_converged = outcome.pagerank_converged;
        stats.candidates_considered = outcome.candidates_considered;
        stats.dropped_below_threshold = outcome.dropped_below_threshold;
        stats.dropped_by_limit = outcome.dropped_by_limit;

        info!(
            scopes = config.scope_ids.len(),
            degraded = stats.degraded_scopes.len(),
            candidates = stats.candidates_considered,
            results = outcome.events.len(),
            "search complete"
        );

        Ok(SearchResult {
            events: outcome.events,
            clues: ledger.into_inner(),
            stats,
        })
    }

    /// Runs the per-scope recall+expand pipelines, concurrently for
    /// multi-scope searches, and returns outcomes in request order.
    async fn run_scopes(
        &self,
        config: &SearchConfig,
        plan: &Arc<QueryPlan>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(ScopeId, Result<ScopeHarvest>)>> {
        if let [scope_id] = config.scope_ids.as_slice() {
            let outcome = run_scope(
                Arc::clone(&self.index),
                Arc::clone(&self.graph),
                Arc::clone(plan),
                scope_id.clone(),
                config.recall.clone(),
                config.expand.clone(),
                cancel.clone(),
            )
            .await;
            return Ok(vec![(scope_id.clone(), outcome)]);
        }

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_scopes));
        let mut handles = Vec::with_capacity(config.scope_ids.len());
        for scope_id in &config.scope_ids {
            let semaphore = Arc::clone(&semaphore);
            let index = Arc::clone(&self.index);
            let graph = Arc::clone(&self.graph);
            let plan = Arc::clone(plan);
            let scope = scope_id.clone();
            let recall_config = config.recall.clone();
            let expand_config = config.expand.clone();
            let cancel = cancel.clone();
            handles.push((
                scope_id.clone(),
                tokio::spawn(async move {
                    // Holding the permit for the whole pipeline bounds how
                    // many scopes hit the backends at once.
                    let _permit = semaphore.acquire_owned().await.ok();
                    run_scope(index, graph, plan, scope, recall_config, expand_config, cancel)
                        .await
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (scope_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Recall {
                    scope: scope_id.clone(),
                    cause: format!("scope task failed: {e}"),
                }),
            };
            outcomes.push((scope_id, outcome));
        }
        Ok(outcomes)
    }
}

/// One scope's recall+expand pipeline.
async fn run_scope(
    index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
    plan: Arc<QueryPlan>,
    scope_id: ScopeId,
    recall_config: RecallConfig,
    expand_config: ExpandConfig,
    cancel: CancellationToken,
) -> Result<ScopeHarvest> {
    let recall = RecallService::new(Arc::clone(&index), Arc::clone(&graph));
    let recalled = recall
        .recall(&plan, &scope_id, &recall_config, &cancel)
        .await?;

    let expand = ExpandService::new(index, graph);
    let expanded = expand
        .expand(
            &plan.query_embedding,
            &recalled.entities,
            &scope_id,
            &expand_config,
            &cancel,
        )
        .await?;

    Ok(ScopeHarvest {
        scope_id,
        recall: recalled,
        expand: expanded,
    })
}

/// Folds one scope's harvest into the pooled candidate state.
fn pool_harvest(
    harvest: ScopeHarvest,
    stats: &mut SearchStats,
    ledger: &mut ClueLedger,
    candidates: &mut Vec<CandidateEvent>,
    activations: &mut HashMap<EntityId, f32>,
    expansion_ran: &mut bool,
    expansion_converged: &mut bool,
) {
    let ScopeHarvest {
        scope_id,
        recall,
        expand,
    } = harvest;

    stats.recall_entities += recall.entities.len();
    stats.recall_events += recall.events.len();
    stats.expand_entities += expand.discovered_entities;
    stats.expand_events += expand.events.len();
    stats.expand_hops = stats.expand_hops.max(expand.hops_run);
    if expand.hops_run > 0 {
        *expansion_ran = true;
        *expansion_converged &= expand.converged;
    }
    if let Some(error) = expand.error {
        stats.expansion_errors.push(format!("{scope_id}: {error}"));
    }

    ledger.extend(recall.clues);
    ledger.extend(expand.clues);

    for (event_id, similarity) in recall.events {
        candidates.push(CandidateEvent {
            event_id,
            scope_id: scope_id.clone(),
            graph_weight: 0.0,
            query_similarity: Some(similarity),
        });
    }
    for event in expand.events {
        candidates.push(CandidateEvent {
            event_id: event.event_id,
            scope_id: scope_id.clone(),
            graph_weight: event.weight,
            query_similarity: None,
        });
    }
    // Scopes are disjoint, so this only merges within one scope's reruns.
    for (entity_id, weight) in expand.entity_activations {
        activations
            .entry(entity_id)
            .and_modify(|best| *best = best.max(weight))
            .or_insert(weight);
    }
}
