//! Instance expansion and post-expansion validation.
//!
//! Expansion is the first pass allowed to look at per-instance values:
//! the expression evaluator supplies, for each consumer instance, the
//! result of its provider-selection index expression. Each consumer
//! instance ends up with an edge to exactly one provider-instance node
//! per requirement entry, chosen by converting the evaluated result to a
//! string and matching it against the block's declared keys.
//!
//! Failures here are accumulated per node and reported together: one bad
//! index must not hide the others, and must not corrupt the graph used
//! to walk unaffected nodes.

use serde_json::Value;

use crate::addrs::{InstanceKey, Provider};
use crate::config::{
    ConfigResolver, KeyExpr, ModuleConfig, ProviderRef, consumer_keys, match_instance_key,
};
use crate::core::{BuildError, NodeFailure, RiggingError};
use crate::graph::{ChosenProvider, Graph, GraphTransformer, NodeId};

/// The statically-known outcome of one provider-selection index
/// expression, as reported by the expression evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatedKey {
    /// No index expression exists for this reference.
    None,
    /// The expression evaluated to this value.
    Value(Value),
    /// The expression depends on values not known until apply time.
    NotStatic,
}

/// The expression-evaluation collaborator.
///
/// Implemented by the out-of-scope expression runtime; rigging only asks
/// one question of it: the per-instance result of a dynamic provider
/// index expression (`each.key` and friends). Everything statically
/// known arrives through the configuration snapshot instead.
pub trait ExpressionEvaluator {
    /// The index-expression result for `instance_key` of the consumer
    /// behind `node`.
    fn provider_instance_key(&self, node: &NodeId, instance_key: &InstanceKey) -> EvaluatedKey;
}

/// An evaluator with no expression runtime attached: every dynamic index
/// is reported as not statically evaluable.
pub struct NullEvaluator;

impl ExpressionEvaluator for NullEvaluator {
    fn provider_instance_key(&self, _node: &NodeId, _instance_key: &InstanceKey) -> EvaluatedKey {
        EvaluatedKey::NotStatic
    }
}

/// Expands consumer nodes into per-key instances and wires each instance
/// to its chosen provider instance.
pub struct NodeExpansionTransformer<'a> {
    /// The module's configuration.
    pub config: &'a ModuleConfig,
    /// The module's resolution snapshot.
    pub resolver: &'a ConfigResolver,
    /// The expression runtime supplying per-instance index results.
    pub evaluator: &'a dyn ExpressionEvaluator,
}

impl NodeExpansionTransformer<'_> {
    /// Resolve the provider instance one consumer instance needs.
    fn resolve_choice(
        &self,
        reference: &ProviderRef,
        node: &NodeId,
        instance_key: &InstanceKey,
    ) -> Result<ChosenProvider, RiggingError> {
        let block = self.resolver.resolve_ref(reference)?;
        let addr = block.addr.to_string();
        let chosen_key = match &reference.key_expr {
            KeyExpr::None => {
                if block.repeated {
                    return Err(RiggingError::MissingInstanceKey { addr });
                }
                match block.instances.first() {
                    Some(decl) => decl.key.clone(),
                    None => {
                        return Err(RiggingError::InternalConsistency {
                            message: format!("provider block {addr} expanded to no instances"),
                        });
                    }
                }
            }
            KeyExpr::Static(key) => match_instance_key(
                &addr,
                &block.instance_keys(),
                &Value::String(key.clone()),
            )?,
            KeyExpr::Dynamic => match self.evaluator.provider_instance_key(node, instance_key) {
                EvaluatedKey::Value(value) => {
                    match_instance_key(&addr, &block.instance_keys(), &value)?
                }
                EvaluatedKey::NotStatic => {
                    return Err(RiggingError::ProviderKeyNotStatic { addr });
                }
                EvaluatedKey::None => {
                    return Err(RiggingError::MissingInstanceKey { addr });
                }
            },
        };
        Ok(ChosenProvider {
            config: block.addr.clone(),
            instance: block.instance_addr(chosen_key),
        })
    }

    fn expand_consumer(
        &self,
        graph: &mut Graph,
        unexpanded: &NodeId,
        instance: NodeId,
        references: &[&ProviderRef],
        instance_key: &InstanceKey,
        failures: &mut Vec<NodeFailure>,
    ) {
        graph.add_dependency(instance.clone(), unexpanded.clone());
        for reference in references {
            match self.resolve_choice(reference, &instance, instance_key) {
                Ok(chosen) => {
                    graph.add_dependency(
                        instance.clone(),
                        NodeId::ProviderInstance(chosen.instance.clone()),
                    );
                    graph.record_choice(instance.clone(), chosen);
                }
                Err(error) => {
                    failures.push(NodeFailure {
                        node: instance.to_string(),
                        error,
                    });
                }
            }
        }
    }
}

impl GraphTransformer for NodeExpansionTransformer<'_> {
    fn name(&self) -> &'static str {
        "node-expansion"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        // Surviving provider blocks expand into their instance nodes
        // first; pruning already ran, so nothing here can resurrect an
        // unreferenced block.
        for block in self.resolver.blocks() {
            let block_node = NodeId::ProviderConfig(block.addr.clone());
            if !graph.contains(&block_node) {
                continue;
            }
            for decl in &block.instances {
                let instance = NodeId::ProviderInstance(block.instance_addr(decl.key.clone()));
                graph.add_dependency(instance, block_node.clone());
            }
        }

        let mut failures = Vec::new();

        for resource in &self.config.resources {
            let addr = resource.addr(&self.config.module);
            let unexpanded = NodeId::Resource(addr.clone());
            let implied;
            let reference = match &resource.provider {
                Some(reference) => reference,
                None => {
                    implied = ProviderRef::default_for(resource.implied_provider_local_name());
                    &implied
                }
            };
            for key in consumer_keys(&resource.repetition) {
                let instance = NodeId::ResourceInstance(addr.clone(), key.clone());
                self.expand_consumer(
                    graph,
                    &unexpanded,
                    instance,
                    &[reference],
                    &key,
                    &mut failures,
                );
            }
        }

        for call in &self.config.module_calls {
            let addr = call.addr(&self.config.module);
            let unexpanded = NodeId::ModuleCall(addr.clone());
            let references: Vec<&ProviderRef> = call.providers.values().collect();
            for key in consumer_keys(&call.repetition) {
                let instance = NodeId::ModuleCallInstance(addr.clone(), key.clone());
                self.expand_consumer(
                    graph,
                    &unexpanded,
                    instance,
                    &references,
                    &key,
                    &mut failures,
                );
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by(|a, b| a.node.cmp(&b.node));
            Err(BuildError::Expansion { failures })
        }
    }
}

/// Validates the post-expansion invariants.
///
/// Both checks should be unreachable given correct earlier passes, so a
/// violation is a defect report, not a user-facing validation message:
/// sibling instances of one resource must agree on the provider type,
/// and every chosen instance must lie within its unexpanded parent's
/// declared requirement set - pruning decided against that set before
/// instances existed, and a choice outside it would mean the graph was
/// pruned on false premises.
pub struct ConsistencyCheckTransformer;

impl GraphTransformer for ConsistencyCheckTransformer {
    fn name(&self) -> &'static str {
        "consistency-check"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), BuildError> {
        use std::collections::BTreeMap;

        let defect = |message: String| {
            Err(BuildError::Defect(RiggingError::InternalConsistency {
                message,
            }))
        };

        let mut sibling_types: BTreeMap<NodeId, Provider> = BTreeMap::new();

        for (node, choices) in graph.choices() {
            let Some(parent) = node.unexpanded_parent() else {
                return defect(format!("provider choice recorded for non-instance node {node}"));
            };
            let Some(requirements) = graph.requirements_of(&parent) else {
                return defect(format!("no requirement set recorded for {parent}"));
            };

            for chosen in choices {
                if !requirements
                    .iter()
                    .any(|req| req.permits(&chosen.config, &chosen.instance))
                {
                    return defect(format!(
                        "instance {node} chose provider {} outside the declared set of {parent}",
                        chosen.instance
                    ));
                }
            }

            if let NodeId::Resource(_) = parent {
                if let Some(chosen) = choices.first() {
                    let provider = chosen.instance.provider.clone();
                    match sibling_types.get(&parent) {
                        Some(existing) if *existing != provider => {
                            return defect(format!(
                                "sibling instances of {parent} disagree on provider type \
                                 ({existing} vs {provider})"
                            ));
                        }
                        Some(_) => {}
                        None => {
                            sibling_types.insert(parent.clone(), provider);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
