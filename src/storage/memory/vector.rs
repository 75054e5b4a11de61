//! In-memory vector index.

use super::cosine_similarity;
use crate::Result;
use crate::models::{EntityId, EventId, ScopeId};
use crate::storage::traits::VectorIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Record {
    scope_id: ScopeId,
    vector: Vec<f32>,
}

/// Brute-force in-memory vector index.
///
/// Scans every stored vector per lookup; `candidate_pool` has no effect since
/// the scan is already exhaustive. Interior mutability keeps the trait's
/// `&self` contract.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    entities: Mutex<HashMap<EntityId, Record>>,
    events: Mutex<HashMap<EventId, Record>>,
}

impl InMemoryVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity vector.
    pub fn upsert_entity(&self, scope_id: ScopeId, id: EntityId, vector: Vec<f32>) {
        self.entities
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, Record { scope_id, vector });
    }

    /// Inserts or replaces an event vector.
    pub fn upsert_event(&self, scope_id: ScopeId, id: EventId, vector: Vec<f32>) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, Record { scope_id, vector });
    }
}

fn scan<K: Clone + Ord>(
    records: &HashMap<K, Record>,
    scope_ids: &[ScopeId],
    query_vector: &[f32],
    top_k: usize,
    min_similarity: f32,
) -> Vec<(K, f32)> {
    let mut hits: Vec<(K, f32)> = records
        .iter()
        .filter(|(_, record)| scope_ids.contains(&record.scope_id))
        .map(|(id, record)| (id.clone(), cosine_similarity(query_vector, &record.vector)))
        .filter(|(_, similarity)| *similarity >= min_similarity)
        .collect();

    // Deterministic ordering: similarity descending, then id ascending.
    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    hits.truncate(top_k);
    hits
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search_entities(
        &self,
        scope_ids: &[ScopeId],
        query_vector: &[f32],
        top_k: usize,
        _candidate_pool: usize,
        min_similarity: f32,
    ) -> Result<Vec<(EntityId, f32)>> {
        let records = self
            .entities
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(scan(&records, scope_ids, query_vector, top_k, min_similarity))
    }

    async fn search_events(
        &self,
        scope_ids: &[ScopeId],
        query_vector: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(EventId, f32)>> {
        let records = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(scan(&records, scope_ids, query_vector, top_k, min_similarity))
    }

    async fn score_events(
        &self,
        scope_ids: &[ScopeId],
        query_vector: &[f32],
        event_ids: &[EventId],
    ) -> Result<Vec<(EventId, f32)>> {
        let records = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(event_ids
            .iter()
            .filter_map(|id| {
                records
                    .get(id)
                    .filter(|record| scope_ids.contains(&record.scope_id))
                    .map(|record| (id.clone(), cosine_similarity(query_vector, &record.vector)))
            })
            .collect())
    }
}
