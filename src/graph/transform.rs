//! Graph construction passes: nodes, requirement edges, pruning.
//!
//! Each pass is a [`GraphTransformer`] run by the builder in a fixed
//! order. The passes in this module build the pre-expansion skeleton;
//! their failures abort construction entirely, because no partial graph
//! is safe to walk without its provider skeleton.

use crate::config::{
    ConfigResolver, ModuleConfig, module_call_requirements, resource_requirements,
};
use crate::core::BuildError;
use crate::graph::{Graph, NodeId};

/// One pass over the graph under construction.
pub trait GraphTransformer {
    /// Short pass name, for trace logging.
    fn name(&self) -> &'static str;

    /// Apply the pass.
    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError>;
}

/// Adds one node per provider configuration block.
///
/// Provider expansion itself ran when the [`ConfigResolver`] snapshot
/// was built, so each block arrives here with its instance keys already
/// known; the block is still a single node at this phase, and edges in
/// later passes target the block rather than a specific instance.
pub struct ProviderConfigTransformer<'a> {
    /// The module's resolution snapshot.
    pub resolver: &'a ConfigResolver,
}

impl GraphTransformer for ProviderConfigTransformer<'_> {
    fn name(&self) -> &'static str {
        "provider-configs"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        for block in self.resolver.blocks() {
            graph.add_node(NodeId::ProviderConfig(block.addr.clone()));
        }
        Ok(())
    }
}

/// Adds one unexpanded node per resource, data source, and module call.
pub struct ConfigNodeTransformer<'a> {
    /// The module's configuration.
    pub config: &'a ModuleConfig,
}

impl GraphTransformer for ConfigNodeTransformer<'_> {
    fn name(&self) -> &'static str {
        "config-nodes"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        for resource in &self.config.resources {
            graph.add_node(NodeId::Resource(resource.addr(&self.config.module)));
        }
        for call in &self.config.module_calls {
            graph.add_node(NodeId::ModuleCall(call.addr(&self.config.module)));
        }
        Ok(())
    }
}

/// Attaches every consumer node to the provider blocks in its declared
/// requirement set, recording the set on the graph for the post-
/// expansion subset check.
pub struct ProviderLinkTransformer<'a> {
    /// The module's configuration.
    pub config: &'a ModuleConfig,
    /// The module's resolution snapshot.
    pub resolver: &'a ConfigResolver,
}

impl GraphTransformer for ProviderLinkTransformer<'_> {
    fn name(&self) -> &'static str {
        "provider-links"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        for resource in &self.config.resources {
            let node = NodeId::Resource(resource.addr(&self.config.module));
            let set =
                resource_requirements(resource, self.resolver).map_err(BuildError::Abort)?;
            for requirement in &set {
                graph.add_dependency(
                    node.clone(),
                    NodeId::ProviderConfig(requirement.config.clone()),
                );
            }
            graph.set_requirements(node, set);
        }
        for call in &self.config.module_calls {
            let node = NodeId::ModuleCall(call.addr(&self.config.module));
            let set = module_call_requirements(call, self.resolver).map_err(BuildError::Abort)?;
            for requirement in &set {
                graph.add_dependency(
                    node.clone(),
                    NodeId::ProviderConfig(requirement.config.clone()),
                );
            }
            graph.set_requirements(node, set);
        }
        Ok(())
    }
}

/// Removes provider blocks no consumer points at.
///
/// This must run strictly before expansion: expansion adds edges to
/// provider nodes, and a block the user never referenced must not be
/// resurrected by an instance-level edge that only exists because the
/// block was still lying around.
pub struct PruneUnusedProvidersTransformer;

impl GraphTransformer for PruneUnusedProvidersTransformer {
    fn name(&self) -> &'static str {
        "prune-unused-providers"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        let unused: Vec<NodeId> = graph
            .nodes()
            .into_iter()
            .filter(|node| node.is_provider_config() && graph.consumer_count(node) == 0)
            .collect();
        if unused.is_empty() {
            return Ok(());
        }
        for node in &unused {
            tracing::debug!(provider = %node, "pruning unused provider configuration");
        }
        graph.retain_nodes(|node| !unused.contains(node));
        Ok(())
    }
}
