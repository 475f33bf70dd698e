//! Authority scores over the link graph.
//!
//! Power iteration in which every document hands its mass to the documents
//! that link to it (its `linked_from` set), plus a uniform leak of `damping`.
//! Documents nobody links to spread their mass over the whole collection.

use rayon::prelude::*;

use crate::config::RankConfig;
use crate::error::{Result, SearchError};
use crate::index::LinkGraph;

/// Computes the authority vector, indexed by dense document index.
pub fn authority_scores(graph: &LinkGraph, config: &RankConfig) -> Result<Vec<f64>> {
    let n = graph.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let floor = config.damping / n as f64;
    let follow = 1.0 - config.damping;

    let mut prev = seed(graph);
    for iteration in 1..=config.max_iterations {
        let next = step(graph, &prev, floor, follow);
        let residual = l1_distance(&next, &prev);
        tracing::debug!(iteration, residual, "authority iteration");
        prev = next;
        if residual < config.tolerance {
            tracing::info!(iterations = iteration, documents = n, "authority scores converged");
            return Ok(prev);
        }
    }
    let residual = l1_distance(&step(graph, &prev, floor, follow), &prev);
    Err(SearchError::ConvergenceFailure { iterations: config.max_iterations, residual })
}

/// Initial mass proportional to inbound link counts; uniform for an edgeless graph.
fn seed(graph: &LinkGraph) -> Vec<f64> {
    let n = graph.len();
    let total = graph.inbound_edge_count();
    if total == 0 {
        return vec![1.0 / n as f64; n];
    }
    graph.linked_from.iter().map(|from| from.len() as f64 / total as f64).collect()
}

fn step(graph: &LinkGraph, prev: &[f64], floor: f64, follow: f64) -> Vec<f64> {
    let n = prev.len();
    // Per-thread accumulators: (targeted contributions, mass spread uniformly).
    let (mut next, dangling) = graph
        .linked_from
        .par_iter()
        .zip(prev.par_iter())
        .fold(
            || (vec![0.0f64; n], 0.0f64),
            |(mut acc, mut dangling), (sources, &mass)| {
                if sources.is_empty() {
                    dangling += follow * mass;
                } else {
                    let share = follow * mass / sources.len() as f64;
                    for &source in sources {
                        acc[source] += share;
                    }
                }
                (acc, dangling)
            },
        )
        .reduce(
            || (vec![0.0f64; n], 0.0f64),
            |(mut a, da), (b, db)| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                (a, da + db)
            },
        );
    let uniform = floor + dangling / n as f64;
    for value in next.iter_mut() {
        *value += uniform;
    }
    next
}

fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(linked_from: Vec<Vec<usize>>) -> LinkGraph {
        LinkGraph { linked_from }
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn edgeless_graph_is_uniform() {
        let scores = authority_scores(&graph(vec![vec![], vec![], vec![], vec![]]), &RankConfig::default()).unwrap();
        for s in &scores {
            assert!((s - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn mutual_links_outrank_isolated_page() {
        // A <-> B, C isolated
        let scores = authority_scores(&graph(vec![vec![1], vec![0], vec![]]), &RankConfig::default()).unwrap();
        assert!((scores[0] - scores[1]).abs() < 1e-9);
        assert!(scores[0] > scores[2]);
        assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mass_flows_back_to_linking_documents() {
        // A -> B and C -> B: B is linked from A and C.
        let g = graph(vec![vec![], vec![0, 2], vec![]]);
        let config = RankConfig::default();
        let floor = config.damping / 3.0;
        let follow = 1.0 - config.damping;

        let seeded = seed(&g);
        assert_close(&seeded, &[0.0, 1.0, 0.0]);

        // B splits its mass between A and C; A and C hold nothing yet.
        let first = step(&g, &seeded, floor, follow);
        assert_close(&first, &[0.475, 0.05, 0.475]);

        // A and C now have no linked_from, so their mass spreads uniformly.
        let second = step(&g, &first, floor, follow);
        let spread = 0.85 * 0.95 / 3.0;
        assert_close(&second, &[0.05 + spread + 0.02125, 0.05 + spread, 0.05 + spread + 0.02125]);

        let scores = authority_scores(&g, &config).unwrap();
        assert!((scores[0] - scores[2]).abs() < 1e-9);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn mass_is_conserved_on_a_chain() {
        let scores = authority_scores(&graph(vec![vec![], vec![0], vec![1], vec![1, 2]]), &RankConfig::default()).unwrap();
        assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iteration_cap_is_a_convergence_failure() {
        let config = RankConfig { tolerance: 0.0, max_iterations: 3, ..RankConfig::default() };
        let err = authority_scores(&graph(vec![vec![1], vec![2], vec![]]), &config).unwrap_err();
        assert!(matches!(err, SearchError::ConvergenceFailure { iterations: 3, .. }));
    }

    #[test]
    fn empty_graph_has_no_scores() {
        assert!(authority_scores(&LinkGraph::default(), &RankConfig::default()).unwrap().is_empty());
    }
}
