//! The dependency graph and its construction passes.
//!
//! [`Graph`] is a directed graph over configuration objects: edges mean
//! "must be evaluated after", so a consumer node carries an edge to every
//! provider node it may need. Construction is single-threaded and
//! deterministic - ordering falls out of configuration content, never
//! timing - and runs as a strict sequence of passes driven by
//! [`GraphBuilder`]:
//!
//! 1. provider configuration nodes ([`ProviderConfigTransformer`])
//! 2. unexpanded consumer nodes ([`ConfigNodeTransformer`])
//! 3. requirement edges ([`ProviderLinkTransformer`])
//! 4. unused-provider pruning ([`PruneUnusedProvidersTransformer`]) -
//!    strictly before expansion, so instance-level edges can never
//!    resurrect a block nothing referenced
//! 5. instance expansion ([`NodeExpansionTransformer`])
//! 6. post-expansion consistency validation
//! 7. transitive reduction ([`TransitiveReductionTransformer`])
//!
//! After construction the graph is handed off read-mostly: the walking
//! driver asks for [`Graph::topological_order`] and
//! [`Graph::provider_for_instance`].

mod builder;
mod expand;
mod node;
mod reduce;
mod transform;

#[cfg(test)]
mod graph_tests;

pub use builder::GraphBuilder;
pub use expand::{
    ConsistencyCheckTransformer, EvaluatedKey, ExpressionEvaluator, NodeExpansionTransformer,
    NullEvaluator,
};
pub use node::NodeId;
pub use reduce::{TransitiveReductionTransformer, transitive_reduction};
pub use transform::{
    ConfigNodeTransformer, GraphTransformer, ProviderConfigTransformer, ProviderLinkTransformer,
    PruneUnusedProvidersTransformer,
};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::addrs::{AbsProviderInstance, ProviderConfigAddr};
use crate::config::ProviderRequirement;
use crate::core::RiggingError;

/// A provider instance chosen for one consumer instance, together with
/// the block it was chosen from so the subset relation can be checked
/// against the pre-expansion requirement set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenProvider {
    /// The block the instance belongs to.
    pub config: ProviderConfigAddr,
    /// The chosen instance address.
    pub instance: AbsProviderInstance,
}

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// The dependency graph built from one module's configuration.
///
/// Besides nodes and edges this owns the two construction-time records
/// later passes and the walk driver need: each unexpanded node's
/// declared provider requirement set, and each expanded instance's
/// chosen provider instance.
#[derive(Debug, Default)]
pub struct Graph {
    /// The underlying directed graph.
    graph: DiGraph<NodeId, ()>,
    /// Map from node identities to their graph indices.
    node_map: HashMap<NodeId, NodeIndex>,
    /// Declared requirement sets, keyed by unexpanded consumer node.
    requirements: BTreeMap<NodeId, BTreeSet<ProviderRequirement>>,
    /// Chosen provider instances, keyed by consumer instance node.
    choices: BTreeMap<NodeId, Vec<ChosenProvider>>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it doesn't already exist, returning its index.
    fn ensure_node(&mut self, node: NodeId) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&node) {
            index
        } else {
            let index = self.graph.add_node(node.clone());
            self.node_map.insert(node, index);
            index
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: NodeId) {
        self.ensure_node(node);
    }

    /// Whether the graph contains a node.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.node_map.contains_key(node)
    }

    /// Add a dependency edge: `from` must be evaluated after `to`.
    ///
    /// Duplicate edges are not added twice.
    pub fn add_dependency(&mut self, from: NodeId, to: NodeId) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// The number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node identities, unordered.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.graph.node_indices().map(|idx| self.graph[idx].clone()).collect()
    }

    /// All edges as `(from, to)` identity pairs, sorted for determinism.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].clone(), self.graph[b].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// The direct dependencies of a node (its outgoing edge targets).
    pub fn dependencies_of(&self, node: &NodeId) -> Vec<NodeId> {
        match self.node_map.get(node) {
            Some(&idx) => self.graph.neighbors(idx).map(|n| self.graph[n].clone()).collect(),
            None => Vec::new(),
        }
    }

    /// The number of consumers pointing at a node.
    pub fn consumer_count(&self, node: &NodeId) -> usize {
        match self.node_map.get(node) {
            Some(&idx) => self.graph.neighbors_directed(idx, Direction::Incoming).count(),
            None => 0,
        }
    }

    /// Drop every node failing the predicate, with its edges, and
    /// re-index the identity map.
    pub fn retain_nodes(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
        self.graph.retain_nodes(|frozen, idx| keep(&frozen[idx]));
        self.node_map = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx].clone(), idx))
            .collect();
    }

    /// Record an unexpanded node's declared provider requirement set.
    pub fn set_requirements(&mut self, node: NodeId, set: BTreeSet<ProviderRequirement>) {
        self.requirements.insert(node, set);
    }

    /// The declared requirement set of an unexpanded node.
    pub fn requirements_of(&self, node: &NodeId) -> Option<&BTreeSet<ProviderRequirement>> {
        self.requirements.get(node)
    }

    /// Record a consumer instance's chosen provider instance.
    pub fn record_choice(&mut self, node: NodeId, chosen: ChosenProvider) {
        self.choices.entry(node).or_default().push(chosen);
    }

    /// All recorded choices, keyed by consumer instance node.
    pub fn choices(&self) -> &BTreeMap<NodeId, Vec<ChosenProvider>> {
        &self.choices
    }

    /// The provider instance a consumer instance needs, as used by the
    /// plan/apply driver when dispatching the provider call.
    ///
    /// Module-call instances may carry several choices (one per
    /// `providers` entry); resource instances carry exactly one.
    pub fn provider_for_instance(&self, node: &NodeId) -> Option<&AbsProviderInstance> {
        self.choices.get(node).and_then(|c| c.first()).map(|c| &c.instance)
    }

    /// Detect cycles using DFS with colors, reporting the cycle path.
    pub fn detect_cycles(&self) -> Result<(), RiggingError> {
        let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            colors.insert(node, Color::White);
        }

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White)) {
                if let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path) {
                    let cycle_str = cycle
                        .iter()
                        .map(|idx| self.graph[*idx].to_string())
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    return Err(RiggingError::CircularDependency { cycle: cycle_str });
                }
            }
        }

        Ok(())
    }

    /// DFS visit for cycle detection; returns the cycle path if found.
    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let cycle_start = path.iter().position(|n| *n == neighbor).unwrap();
                    let mut cycle = path[cycle_start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Validate the graph for walking: it must be acyclic.
    pub fn validate(&self) -> Result<(), RiggingError> {
        self.detect_cycles()
    }

    /// The evaluation order: dependencies before their dependents.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, RiggingError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => {
                let mut order = Vec::with_capacity(indices.len());
                // Reverse so dependencies come first.
                for idx in indices.into_iter().rev() {
                    order.push(self.graph[idx].clone());
                }
                Ok(order)
            }
            Err(_) => Err(RiggingError::InternalConsistency {
                message: "toposort failed on a graph that passed cycle detection".to_string(),
            }),
        }
    }

    /// Remove redundant edges, keeping reachability identical.
    ///
    /// Skipped silently when the graph fails validation: reduction is an
    /// optimization and must never turn a previously-valid graph into a
    /// failure.
    pub fn reduce(&mut self) {
        if self.validate().is_err() {
            return;
        }
        transitive_reduction(&mut self.graph);
    }
}
