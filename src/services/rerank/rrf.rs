//! Reciprocal Rank Fusion.
//!
//! RRF combines ranked lists from independent retrieval methods without
//! normalizing their scores:
//!
//! ```text
//! fused(d) = Σ_lists 1 / (k + rank_list(d))
//! ```
//!
//! with 1-indexed ranks and `k` the smoothing constant (60 by convention;
//! higher values dampen the influence of top ranks). A document absent from a
//! list contributes 0 for it.
//!
//! # References
//!
//! - Cormack, G. V., Clarke, C. L., & Buettcher, S. (2009). "Reciprocal Rank
//!   Fusion outperforms Condorcet and individual Rank Learning Methods"

use crate::models::EventId;
use std::collections::HashMap;

/// Fuses any number of ranked lists by reciprocal rank.
///
/// Input lists are ordered best-first; ranks are 1-indexed. Returns the fused
/// score per event id, unordered; callers apply their own sort and
/// tie-break.
#[must_use]
pub fn fuse(lists: &[&[EventId]], k: f32) -> HashMap<EventId, f32> {
    let capacity: usize = lists.iter().map(|l| l.len()).sum();
    let mut scores: HashMap<EventId, f32> = HashMap::with_capacity(capacity);

    for list in lists {
        for (index, id) in list.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (k + index as f32 + 1.0);
            *scores.entry(id.clone()).or_insert(0.0) += contribution;
        }
    }
    scores
}
