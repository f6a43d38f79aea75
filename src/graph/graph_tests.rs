use std::collections::BTreeMap;

use serde_json::json;

use super::*;
use crate::addrs::{InstanceKey, ModuleInstance, Provider};
use crate::config::{
    ConfigResolver, KeyExpr, ModuleCall, ModuleConfig, ProviderBlock, ProviderRef, Repetition,
    ResourceBlock, ResourceMode,
};
use crate::core::{BuildError, RiggingError};

fn resource_addr(name: &str) -> crate::config::ResourceAddr {
    crate::config::ResourceAddr {
        module: ModuleInstance::root(),
        mode: ResourceMode::Managed,
        type_name: "aws_instance".to_string(),
        name: name.to_string(),
    }
}

fn node(name: &str) -> NodeId {
    NodeId::Resource(resource_addr(name))
}

/// Evaluator with `each.key` semantics: the provider index result is the
/// consumer instance's own key.
struct EachKeyEvaluator;

impl ExpressionEvaluator for EachKeyEvaluator {
    fn provider_instance_key(&self, _node: &NodeId, key: &InstanceKey) -> EvaluatedKey {
        match key {
            InstanceKey::String(s) => EvaluatedKey::Value(json!(s)),
            _ => EvaluatedKey::NotStatic,
        }
    }
}

fn regions() -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([
        ("us".to_string(), json!("us-east-1")),
        ("eu".to_string(), json!("eu-west-1")),
    ])
}

/// A configuration with a default block, a repeated `east` block, an
/// unused `west` block, and consumers of the first two.
fn fixture() -> ModuleConfig {
    let mut config = ModuleConfig::default();
    config
        .required_providers
        .insert("aws".to_string(), Provider::default_type("aws"));
    config.providers.push(ProviderBlock {
        local_name: "aws".to_string(),
        alias: None,
        repetition: Repetition::Single,
    });
    config.providers.push(ProviderBlock {
        local_name: "aws".to_string(),
        alias: Some("east".to_string()),
        repetition: Repetition::ForEach(regions()),
    });
    config.providers.push(ProviderBlock {
        local_name: "aws".to_string(),
        alias: Some("west".to_string()),
        repetition: Repetition::Single,
    });

    config.resources.push(ResourceBlock {
        mode: ResourceMode::Managed,
        type_name: "aws_instance".to_string(),
        name: "web".to_string(),
        provider: Some(ProviderRef {
            local_name: "aws".to_string(),
            alias: Some("east".to_string()),
            key_expr: KeyExpr::Dynamic,
        }),
        repetition: Repetition::ForEach(regions()),
    });
    config.resources.push(ResourceBlock {
        mode: ResourceMode::Managed,
        type_name: "aws_instance".to_string(),
        name: "db".to_string(),
        provider: None,
        repetition: Repetition::Single,
    });
    config
}

fn build(config: &ModuleConfig) -> Result<Graph, BuildError> {
    let resolver = ConfigResolver::new(config).unwrap();
    GraphBuilder {
        config,
        resolver: &resolver,
        evaluator: &EachKeyEvaluator,
    }
    .build()
}

#[test]
fn empty_graph_is_trivially_walkable() {
    let graph = Graph::new();
    assert_eq!(graph.node_count(), 0);
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.detect_cycles().is_ok());
    assert!(graph.topological_order().unwrap().is_empty());
}

#[test]
fn self_dependency_is_a_cycle() {
    let mut graph = Graph::new();
    graph.add_dependency(node("a"), node("a"));
    let err = graph.detect_cycles().unwrap_err();
    assert!(matches!(err, RiggingError::CircularDependency { .. }));
}

#[test]
fn duplicate_edges_are_not_added() {
    let mut graph = Graph::new();
    graph.add_dependency(node("a"), node("b"));
    graph.add_dependency(node("a"), node("b"));
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn cycle_detection_reports_the_path() {
    let mut graph = Graph::new();
    graph.add_dependency(node("a"), node("b"));
    graph.add_dependency(node("b"), node("c"));
    graph.add_dependency(node("c"), node("a"));

    let err = graph.detect_cycles().unwrap_err();
    match err {
        RiggingError::CircularDependency { cycle } => {
            assert!(cycle.contains("aws_instance.a"), "{cycle}");
            assert!(cycle.contains("->"), "{cycle}");
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn toposort_puts_dependencies_first() {
    let mut graph = Graph::new();
    graph.add_dependency(node("a"), node("b"));
    graph.add_dependency(node("b"), node("c"));

    let order = graph.topological_order().unwrap();
    let position = |name: &str| order.iter().position(|n| *n == node(name)).unwrap();
    assert!(position("c") < position("b"));
    assert!(position("b") < position("a"));
}

#[test]
fn retain_nodes_reindexes_identities() {
    let mut graph = Graph::new();
    graph.add_dependency(node("a"), node("b"));
    graph.add_dependency(node("c"), node("b"));
    graph.retain_nodes(|n| *n != node("a"));

    assert_eq!(graph.node_count(), 2);
    assert!(!graph.contains(&node("a")));
    assert_eq!(graph.dependencies_of(&node("c")), vec![node("b")]);
}

#[test]
fn build_wires_each_instance_to_one_provider_instance() {
    let config = fixture();
    let graph = build(&config).unwrap();

    let web_us = NodeId::ResourceInstance(resource_addr("web"), InstanceKey::string("us"));
    let chosen = graph.provider_for_instance(&web_us).expect("choice recorded");
    assert_eq!(chosen.key, InstanceKey::string("us"));
    assert_eq!(chosen.provider, Provider::default_type("aws"));

    let provider_node = NodeId::ProviderInstance(chosen.clone());
    assert!(graph.dependencies_of(&web_us).contains(&provider_node));

    let web_eu = NodeId::ResourceInstance(resource_addr("web"), InstanceKey::string("eu"));
    assert_eq!(
        graph.provider_for_instance(&web_eu).unwrap().key,
        InstanceKey::string("eu")
    );

    // The default-block consumer gets the un-keyed singleton.
    let db = NodeId::ResourceInstance(resource_addr("db"), InstanceKey::NoKey);
    assert_eq!(graph.provider_for_instance(&db).unwrap().key, InstanceKey::NoKey);
}

#[test]
fn every_choice_stays_inside_the_declared_set() {
    let config = fixture();
    let graph = build(&config).unwrap();

    for (instance, choices) in graph.choices() {
        let parent = instance.unexpanded_parent().unwrap();
        let requirements = graph.requirements_of(&parent).unwrap();
        for chosen in choices {
            assert!(
                requirements
                    .iter()
                    .any(|req| req.permits(&chosen.config, &chosen.instance)),
                "{instance} chose {} outside its declared set",
                chosen.instance
            );
        }
    }
}

#[test]
fn unused_provider_block_is_pruned_before_expansion() {
    let config = fixture();
    let graph = build(&config).unwrap();

    let west = NodeId::ProviderConfig(crate::addrs::ProviderConfigAddr {
        module: ModuleInstance::root(),
        provider: Provider::default_type("aws"),
        alias: Some("west".to_string()),
    });
    assert!(!graph.contains(&west));
    // And none of its instances were materialized either.
    assert!(!graph.nodes().iter().any(|n| {
        matches!(n, NodeId::ProviderInstance(addr) if addr.key == InstanceKey::string("west"))
    }));
}

#[test]
fn prune_runs_strictly_before_expansion() {
    // Run the skeleton passes by hand and stop after pruning: the west
    // block must already be gone, even though expansion has not yet had
    // any chance to add edges.
    let config = fixture();
    let resolver = ConfigResolver::new(&config).unwrap();
    let mut graph = Graph::new();
    ProviderConfigTransformer { resolver: &resolver }.transform(&mut graph).unwrap();
    ConfigNodeTransformer { config: &config }.transform(&mut graph).unwrap();
    ProviderLinkTransformer {
        config: &config,
        resolver: &resolver,
    }
    .transform(&mut graph)
    .unwrap();

    let west = NodeId::ProviderConfig(crate::addrs::ProviderConfigAddr {
        module: ModuleInstance::root(),
        provider: Provider::default_type("aws"),
        alias: Some("west".to_string()),
    });
    assert!(graph.contains(&west));

    PruneUnusedProvidersTransformer.transform(&mut graph).unwrap();
    assert!(!graph.contains(&west));
}

#[test]
fn expansion_failures_accumulate_across_nodes() {
    let mut config = fixture();
    // A resource whose static key names a non-existent instance ...
    config.resources.push(ResourceBlock {
        mode: ResourceMode::Managed,
        type_name: "aws_instance".to_string(),
        name: "bad-static".to_string(),
        provider: Some(ProviderRef {
            local_name: "aws".to_string(),
            alias: Some("east".to_string()),
            key_expr: KeyExpr::Static("ap".to_string()),
        }),
        repetition: Repetition::Single,
    });
    // ... and one that references the repeated block without any key.
    config.resources.push(ResourceBlock {
        mode: ResourceMode::Managed,
        type_name: "aws_instance".to_string(),
        name: "bad-unkeyed".to_string(),
        provider: Some(ProviderRef::aliased("aws", "east")),
        repetition: Repetition::Single,
    });

    let err = build(&config).unwrap_err();
    match err {
        BuildError::Expansion { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().any(|f| {
                f.node.contains("bad-static")
                    && matches!(f.error, RiggingError::UnknownInstanceKey { .. })
            }));
            assert!(failures.iter().any(|f| {
                f.node.contains("bad-unkeyed")
                    && matches!(f.error, RiggingError::MissingInstanceKey { .. })
            }));
        }
        other => panic!("expected accumulated expansion failures, got {other:?}"),
    }
}

#[test]
fn null_evaluator_rejects_dynamic_keys_as_not_static() {
    let config = fixture();
    let resolver = ConfigResolver::new(&config).unwrap();
    let err = GraphBuilder {
        config: &config,
        resolver: &resolver,
        evaluator: &NullEvaluator,
    }
    .build()
    .unwrap_err();

    match err {
        BuildError::Expansion { failures } => {
            assert!(
                failures
                    .iter()
                    .all(|f| matches!(f.error, RiggingError::ProviderKeyNotStatic { .. }))
            );
            // One failure per `web` instance; `db` resolves fine.
            assert_eq!(failures.len(), 2);
        }
        other => panic!("expected expansion failures, got {other:?}"),
    }
}

#[test]
fn module_call_instances_get_one_choice_per_entry() {
    let mut config = fixture();
    let mut providers = BTreeMap::new();
    providers.insert("aws".to_string(), ProviderRef::default_for("aws"));
    let mut keyed = ProviderRef::aliased("aws", "east");
    keyed.key_expr = KeyExpr::Static("eu".to_string());
    providers.insert("aws.east".to_string(), keyed);
    config.module_calls.push(ModuleCall {
        name: "net".to_string(),
        providers,
        repetition: Repetition::Count(2),
    });

    let graph = build(&config).unwrap();
    let call_addr = crate::config::ModuleCallAddr {
        module: ModuleInstance::root(),
        name: "net".to_string(),
    };
    for index in 0..2 {
        let instance =
            NodeId::ModuleCallInstance(call_addr.clone(), InstanceKey::Number(index));
        let choices = &graph.choices()[&instance];
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().any(|c| c.instance.key == InstanceKey::NoKey));
        assert!(choices.iter().any(|c| c.instance.key == InstanceKey::string("eu")));
    }
}

#[test]
fn finished_graph_is_reduced_and_walkable() {
    let config = fixture();
    let graph = build(&config).unwrap();
    graph.validate().unwrap();

    let order = graph.topological_order().unwrap();
    let position = |node: &NodeId| order.iter().position(|n| n == node).unwrap();

    // Each provider instance is configured before every consumer of it.
    for (instance, choices) in graph.choices() {
        for chosen in choices {
            let provider_node = NodeId::ProviderInstance(chosen.instance.clone());
            assert!(position(&provider_node) < position(instance));
        }
    }
}
