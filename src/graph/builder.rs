//! The ordered graph construction pipeline.

use crate::config::{ConfigResolver, ModuleConfig};
use crate::core::BuildError;
use crate::graph::{
    ConfigNodeTransformer, ConsistencyCheckTransformer, ExpressionEvaluator, Graph,
    GraphTransformer, NodeExpansionTransformer, ProviderConfigTransformer,
    ProviderLinkTransformer, PruneUnusedProvidersTransformer, TransitiveReductionTransformer,
};

/// Builds the dependency graph for one module by running the
/// construction passes in their mandatory order.
///
/// The order is load-bearing in both directions: pruning must see the
/// pre-expansion requirement edges (and nothing newer), and expansion
/// must only ever attach instances to blocks that survived pruning.
/// Construction is single-threaded; the finished graph is handed off
/// read-mostly to the concurrent walk driver.
pub struct GraphBuilder<'a> {
    /// The module's configuration snapshot.
    pub config: &'a ModuleConfig,
    /// The module's provider resolution snapshot.
    pub resolver: &'a ConfigResolver,
    /// The expression runtime supplying per-instance index results.
    pub evaluator: &'a dyn ExpressionEvaluator,
}

impl GraphBuilder<'_> {
    /// Run every pass and return the finished, reduced graph.
    ///
    /// Skeleton failures ([`BuildError::Abort`]) stop the whole build;
    /// expansion failures are accumulated per node and returned together
    /// as [`BuildError::Expansion`]; post-expansion invariant violations
    /// surface as [`BuildError::Defect`].
    pub fn build(&self) -> Result<Graph, BuildError> {
        let mut graph = Graph::new();

        let provider_configs = ProviderConfigTransformer {
            resolver: self.resolver,
        };
        let config_nodes = ConfigNodeTransformer {
            config: self.config,
        };
        let links = ProviderLinkTransformer {
            config: self.config,
            resolver: self.resolver,
        };
        let expansion = NodeExpansionTransformer {
            config: self.config,
            resolver: self.resolver,
            evaluator: self.evaluator,
        };
        let passes: [&dyn GraphTransformer; 7] = [
            &provider_configs,
            &config_nodes,
            &links,
            &PruneUnusedProvidersTransformer,
            &expansion,
            &ConsistencyCheckTransformer,
            &TransitiveReductionTransformer,
        ];

        for pass in passes {
            pass.transform(&mut graph)?;
            tracing::debug!(
                pass = pass.name(),
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "graph pass complete"
            );
        }

        Ok(graph)
    }
}
