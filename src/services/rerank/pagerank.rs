//! Weighted PageRank by power iteration.
//!
//! Operates on a dense node indexing of the candidate bipartite subgraph.
//! Each association edge contributes both directions (entity→event and
//! event→entity), weighted by the edge weight; transition probabilities are
//! out-weight normalized and dangling mass is redistributed uniformly, so the
//! score vector keeps summing to 1.

/// L1 convergence threshold for the score delta between iterations.
pub const CONVERGENCE_EPSILON: f32 = 1e-6;

/// The result of a power-iteration run.
#[derive(Debug, Clone)]
pub struct PageRankOutcome {
    /// Final score per node index. Scores sum to ≈ 1.
    pub scores: Vec<f32>,
    /// Iterations actually run.
    pub iterations: u32,
    /// Whether the L1 delta fell below [`CONVERGENCE_EPSILON`] before the
    /// iteration cap. Hitting the cap is not an error; the last computed
    /// scores are still usable.
    pub converged: bool,
}

/// Runs weighted PageRank over a directed edge list.
///
/// `edges` are `(source, target, weight)` triples over node indexes in
/// `0..node_count`. Callers wanting undirected behavior (the bipartite
/// entity↔event projection) pass each association twice, once per direction.
#[must_use]
pub fn power_iterate(
    edges: &[(usize, usize, f32)],
    node_count: usize,
    damping: f32,
    max_iterations: u32,
) -> PageRankOutcome {
    if node_count == 0 {
        return PageRankOutcome {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let n = node_count as f32;
    let uniform = 1.0 / n;
    let teleport = (1.0 - damping) / n;

    let mut out_weight = vec![0.0_f32; node_count];
    for (source, _, weight) in edges {
        out_weight[*source] += weight;
    }

    let mut scores = vec![uniform; node_count];
    for iteration in 1..=max_iterations {
        let mut next = vec![teleport; node_count];

        // Mass of nodes with no outgoing edges is spread uniformly.
        let dangling: f32 = scores
            .iter()
            .zip(out_weight.iter())
            .filter(|(_, out)| **out == 0.0)
            .map(|(score, _)| *score)
            .sum();
        let dangling_share = damping * dangling / n;
        for value in &mut next {
            *value += dangling_share;
        }

        for (source, target, weight) in edges {
            next[*target] += damping * scores[*source] * weight / out_weight[*source];
        }

        let delta: f32 = next
            .iter()
            .zip(scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        scores = next;

        if delta < CONVERGENCE_EPSILON {
            return PageRankOutcome {
                scores,
                iterations: iteration,
                converged: true,
            };
        }
    }

    PageRankOutcome {
        scores,
        iterations: max_iterations,
        converged: false,
    }
}
