//! Transitive reduction of directed acyclic graphs.

use std::collections::HashSet;

use petgraph::graph::DiGraph;
use petgraph::visit::Dfs;

use crate::core::BuildError;
use crate::graph::{Graph, GraphTransformer};

/// Remove every edge `(u, x)` whose endpoints stay connected through
/// some other path, leaving the minimal-edge graph with identical
/// reachability.
///
/// The caller must ensure the graph is acyclic; on a DAG the result is
/// unique and running the reduction on its own output is a no-op. An
/// edge `(u, x)` is redundant exactly when `x` is reachable from another
/// direct successor of `u`, and because the graph is acyclic no path
/// from a successor can re-enter `u`, so all removals can be planned
/// against the unmodified graph.
pub fn transitive_reduction<N, E>(graph: &mut DiGraph<N, E>) {
    let mut redundant = Vec::new();

    for u in graph.node_indices() {
        let successors: HashSet<_> = graph.neighbors(u).collect();
        for &w in &successors {
            let mut dfs = Dfs::new(&*graph, w);
            while let Some(x) = dfs.next(&*graph) {
                if x != w && successors.contains(&x) {
                    redundant.push((u, x));
                }
            }
        }
    }

    redundant.sort();
    redundant.dedup();
    for (u, x) in redundant {
        if let Some(edge) = graph.find_edge(u, x) {
            graph.remove_edge(edge);
        }
    }
}

/// The final construction pass: transitively reduce the finished graph.
///
/// If the graph isn't valid the reduction is skipped without error -
/// validation failures are surfaced by the passes that own them, and an
/// unreduced graph is still correct to walk, just with redundant
/// synchronization edges.
pub struct TransitiveReductionTransformer;

impl GraphTransformer for TransitiveReductionTransformer {
    fn name(&self) -> &'static str {
        "transitive-reduction"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        graph.reduce();
        Ok(())
    }
}
