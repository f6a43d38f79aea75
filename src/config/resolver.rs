//! Per-module provider resolution snapshot.
//!
//! [`ConfigResolver`] is built once per module, immediately after the
//! module's configuration is parsed and before any graph edge exists. It
//! expands every `provider` block into its declared instances (provider
//! expansion needs only static-evaluation values, so it completes before
//! graph construction), synthesizes implied default configurations for
//! provider types that are used but never declared, and enforces the
//! global-uniqueness invariant on the resulting absolute instance
//! addresses.
//!
//! The resolver is also the query surface handed to the expression
//! evaluator: "what are the instance keys of block X" and "what absolute
//! address does this local reference resolve to".

use std::collections::{BTreeMap, BTreeSet};

use crate::addrs::{
    AbsProviderInstance, InstanceKey, LocalProviderInstance, ModuleInstance, Provider,
    ProviderConfigAddr,
};
use crate::config::repetition::{ProviderInstanceDecl, expand_provider_block};
use crate::config::{ModuleConfig, ProviderRef};
use crate::core::RiggingError;

/// One provider block with its expansion resolved.
#[derive(Debug, Clone)]
pub struct ResolvedProviderBlock {
    /// The block's address.
    pub addr: ProviderConfigAddr,
    /// The provider's local name within the module.
    pub local_name: String,
    /// Whether the block uses repetition (and therefore requires an
    /// index to select an instance).
    pub repeated: bool,
    /// The declared instances, in deterministic key order.
    pub instances: Vec<ProviderInstanceDecl>,
}

impl ResolvedProviderBlock {
    /// The declared instance keys, in order.
    pub fn instance_keys(&self) -> Vec<InstanceKey> {
        self.instances.iter().map(|i| i.key.clone()).collect()
    }

    /// The absolute address of the instance with the given key.
    pub fn instance_addr(&self, key: InstanceKey) -> AbsProviderInstance {
        AbsProviderInstance {
            module: self.addr.module.clone(),
            provider: self.addr.provider.clone(),
            key,
        }
    }

    /// The singleton instance's absolute address, for un-repeated blocks.
    pub fn singleton_addr(&self) -> Option<AbsProviderInstance> {
        if self.repeated {
            None
        } else {
            self.instances
                .first()
                .map(|decl| self.instance_addr(decl.key.clone()))
        }
    }
}

/// Immutable per-module resolution snapshot.
///
/// Local-name tables are explicit, passed-in data - never ambient
/// globals - so concurrent builds over different modules cannot observe
/// each other.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    module: ModuleInstance,
    local_names: BTreeMap<String, Provider>,
    blocks: Vec<ResolvedProviderBlock>,
}

impl ConfigResolver {
    /// Build the snapshot for one module.
    ///
    /// Fails on repetition-validation errors (alias missing under
    /// `for_each`, `count` on a provider block) and on duplicate
    /// absolute instance addresses; these are abort-class errors, since
    /// no graph can be built without a valid provider skeleton.
    pub fn new(config: &ModuleConfig) -> Result<Self, RiggingError> {
        let mut blocks = Vec::new();
        let mut seen = BTreeSet::new();

        for block in &config.providers {
            let provider = config.provider_for_local_name(&block.local_name);
            let addr = ProviderConfigAddr {
                module: config.module.clone(),
                provider,
                alias: block.alias.clone(),
            };
            let instances = expand_provider_block(&addr.to_string(), block)?;
            tracing::debug!(
                block = %addr,
                instances = instances.len(),
                "expanded provider configuration"
            );
            let resolved = ResolvedProviderBlock {
                addr,
                local_name: block.local_name.clone(),
                repeated: !block.repetition.is_single(),
                instances,
            };
            for decl in &resolved.instances {
                let instance = resolved.instance_addr(decl.key.clone());
                if !seen.insert(instance.clone()) {
                    return Err(RiggingError::DuplicateProviderInstance {
                        addr: instance.to_string(),
                    });
                }
            }
            blocks.push(resolved);
        }

        let mut resolver = Self {
            module: config.module.clone(),
            local_names: config.required_providers.clone(),
            blocks,
        };
        resolver.add_implied_defaults(config, &mut seen)?;
        Ok(resolver)
    }

    /// Synthesize a singleton default configuration for every provider
    /// type that is referenced without an alias but has no declared
    /// un-aliased block, so that every requirement can be satisfied by a
    /// real graph node.
    fn add_implied_defaults(
        &mut self,
        config: &ModuleConfig,
        seen: &mut BTreeSet<AbsProviderInstance>,
    ) -> Result<(), RiggingError> {
        let mut implied: BTreeSet<String> = BTreeSet::new();

        for resource in &config.resources {
            match &resource.provider {
                Some(r) if r.alias.is_none() => {
                    implied.insert(r.local_name.clone());
                }
                None => {
                    implied.insert(resource.implied_provider_local_name().to_string());
                }
                Some(_) => {}
            }
        }
        for call in &config.module_calls {
            for reference in call.providers.values() {
                if reference.alias.is_none() {
                    implied.insert(reference.local_name.clone());
                }
            }
        }

        for local_name in implied {
            if self.default_block_for(&local_name).is_some() {
                continue;
            }
            let provider = config.provider_for_local_name(&local_name);
            let addr = ProviderConfigAddr::default_config(self.module.clone(), provider);
            tracing::debug!(block = %addr, "adding implied default provider configuration");
            let resolved = ResolvedProviderBlock {
                addr,
                local_name: local_name.clone(),
                repeated: false,
                instances: vec![ProviderInstanceDecl {
                    key: InstanceKey::NoKey,
                    each_value: None,
                }],
            };
            let instance = resolved.instance_addr(InstanceKey::NoKey);
            if !seen.insert(instance.clone()) {
                return Err(RiggingError::DuplicateProviderInstance {
                    addr: instance.to_string(),
                });
            }
            self.blocks.push(resolved);
        }
        Ok(())
    }

    /// The module this snapshot belongs to.
    pub fn module(&self) -> &ModuleInstance {
        &self.module
    }

    /// All provider blocks, declared and implied.
    pub fn blocks(&self) -> &[ResolvedProviderBlock] {
        &self.blocks
    }

    /// The un-aliased block for a local name, if any.
    pub fn default_block_for(&self, local_name: &str) -> Option<&ResolvedProviderBlock> {
        self.blocks
            .iter()
            .find(|b| b.local_name == local_name && b.addr.alias.is_none())
    }

    /// Resolve a written reference to its provider block.
    ///
    /// Aliased references must name a declared block; un-aliased
    /// references fall back to the (declared or implied) default block.
    pub fn resolve_ref(&self, reference: &ProviderRef) -> Result<&ResolvedProviderBlock, RiggingError> {
        let found = self.blocks.iter().find(|b| {
            b.local_name == reference.local_name && b.addr.alias == reference.alias
        });
        found.ok_or_else(|| RiggingError::UnknownProviderConfig {
            addr: reference.string_compact(),
        })
    }

    /// Resolve a local instance address to its absolute form using this
    /// module's local-name table.
    pub fn resolve_local_instance(
        &self,
        local: &LocalProviderInstance,
    ) -> Result<AbsProviderInstance, RiggingError> {
        let provider = self
            .local_names
            .get(&local.local_name)
            .cloned()
            .unwrap_or_else(|| Provider::default_type(local.local_name.clone()));
        Ok(AbsProviderInstance {
            module: self.module.clone(),
            provider,
            key: local.key.clone(),
        })
    }

    /// The declared instance keys of the block at `addr`, if the block
    /// exists. This is the query the expression evaluator uses to
    /// validate index results.
    pub fn instance_keys(&self, addr: &ProviderConfigAddr) -> Option<Vec<InstanceKey>> {
        self.blocks
            .iter()
            .find(|b| b.addr == *addr)
            .map(ResolvedProviderBlock::instance_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderBlock, Repetition, ResourceBlock, ResourceMode};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn base_config() -> ModuleConfig {
        let mut config = ModuleConfig::default();
        config
            .required_providers
            .insert("aws".to_string(), Provider::default_type("aws"));
        config
    }

    fn for_each_block(alias: &str) -> ProviderBlock {
        ProviderBlock {
            local_name: "aws".to_string(),
            alias: Some(alias.to_string()),
            repetition: Repetition::ForEach(BTreeMap::from([
                ("us".to_string(), json!("us-east-1")),
                ("eu".to_string(), json!("eu-west-1")),
            ])),
        }
    }

    #[test]
    fn expands_declared_blocks() {
        let mut config = base_config();
        config.providers.push(ProviderBlock {
            local_name: "aws".to_string(),
            alias: None,
            repetition: Repetition::Single,
        });
        config.providers.push(for_each_block("east"));

        let resolver = ConfigResolver::new(&config).unwrap();
        assert_eq!(resolver.blocks().len(), 2);

        let repeated = resolver
            .resolve_ref(&ProviderRef::aliased("aws", "east"))
            .unwrap();
        assert!(repeated.repeated);
        assert_eq!(
            repeated.instance_keys(),
            vec![InstanceKey::string("eu"), InstanceKey::string("us")]
        );
        assert!(repeated.singleton_addr().is_none());
    }

    #[test]
    fn implied_default_block_is_synthesized() {
        let mut config = base_config();
        config.resources.push(ResourceBlock {
            mode: ResourceMode::Managed,
            type_name: "aws_instance".to_string(),
            name: "web".to_string(),
            provider: None,
            repetition: Repetition::Single,
        });

        let resolver = ConfigResolver::new(&config).unwrap();
        let default = resolver.default_block_for("aws").expect("implied default");
        assert!(!default.repeated);
        assert_eq!(default.instance_keys(), vec![InstanceKey::NoKey]);
    }

    #[test]
    fn aliased_reference_to_missing_block_fails() {
        let config = base_config();
        let resolver = ConfigResolver::new(&config).unwrap();
        let err = resolver
            .resolve_ref(&ProviderRef::aliased("aws", "east"))
            .unwrap_err();
        assert!(matches!(err, RiggingError::UnknownProviderConfig { .. }));
    }

    #[test]
    fn duplicate_instance_addresses_abort() {
        let mut config = base_config();
        // Aliased singleton `east` collides with the for_each key "east".
        config.providers.push(ProviderBlock {
            local_name: "aws".to_string(),
            alias: Some("east".to_string()),
            repetition: Repetition::Single,
        });
        config.providers.push(ProviderBlock {
            local_name: "aws".to_string(),
            alias: Some("by-region".to_string()),
            repetition: Repetition::ForEach(BTreeMap::from([(
                "east".to_string(),
                json!("us-east-1"),
            )])),
        });

        let err = ConfigResolver::new(&config).unwrap_err();
        assert!(matches!(err, RiggingError::DuplicateProviderInstance { .. }));
    }

    #[test]
    fn local_instance_resolution_uses_name_table() {
        let mut config = base_config();
        config.required_providers.insert(
            "net".to_string(),
            Provider::new("registry.example.com", "corp", "net"),
        );
        let resolver = ConfigResolver::new(&config).unwrap();

        let local = LocalProviderInstance {
            local_name: "net".to_string(),
            key: InstanceKey::string("prod"),
        };
        let abs = resolver.resolve_local_instance(&local).unwrap();
        assert_eq!(abs.provider.hostname, "registry.example.com");
        assert_eq!(abs.key, InstanceKey::string("prod"));
    }

    #[test]
    fn instance_keys_query_by_config_addr() {
        let mut config = base_config();
        config.providers.push(for_each_block("east"));
        let resolver = ConfigResolver::new(&config).unwrap();

        let addr = ProviderConfigAddr {
            module: ModuleInstance::root(),
            provider: Provider::default_type("aws"),
            alias: Some("east".to_string()),
        };
        assert_eq!(
            resolver.instance_keys(&addr).unwrap(),
            vec![InstanceKey::string("eu"), InstanceKey::string("us")]
        );
        let missing = ProviderConfigAddr {
            alias: Some("west".to_string()),
            ..addr
        };
        assert!(resolver.instance_keys(&missing).is_none());
    }
}
