//! The provider dependency tracker.
//!
//! Every unexpanded configuration node that can require a provider
//! declares, before expansion, the set of provider addresses it may
//! need. The set is deliberately a superset of what any one eventual
//! instance will use: graph pruning decisions are made against it before
//! instances exist, and the later instance-level narrowing must stay
//! within it.
//!
//! The derivation never evaluates per-instance expressions - a dynamic
//! index such as `each.key` widens the requirement to the whole aliased
//! block, to be narrowed only at instance-resolution time.

use std::collections::BTreeSet;
use std::fmt;

use crate::addrs::{AbsProviderInstance, InstanceKey, ProviderConfigAddr};
use crate::config::resolver::ConfigResolver;
use crate::config::{KeyExpr, ModuleCall, ProviderRef, ResourceBlock};
use crate::core::RiggingError;

/// Which instances of a block a requirement covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequiredKey {
    /// All instances of the block: the concrete instance is only known
    /// after the consuming node itself expands.
    All,
    /// Exactly one instance, statically known.
    Exact(InstanceKey),
}

/// One element of an unexpanded node's provider dependency set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderRequirement {
    /// The provider block the requirement targets.
    pub config: ProviderConfigAddr,
    /// Which of the block's instances are covered.
    pub key: RequiredKey,
}

impl ProviderRequirement {
    /// A requirement on every instance of `config`.
    pub fn all_of(config: ProviderConfigAddr) -> Self {
        Self {
            config,
            key: RequiredKey::All,
        }
    }

    /// Whether an instance chosen from `config` satisfies this
    /// requirement - the subset relation checked after expansion.
    pub fn permits(&self, config: &ProviderConfigAddr, instance: &AbsProviderInstance) -> bool {
        if self.config != *config {
            return false;
        }
        match &self.key {
            RequiredKey::All => true,
            RequiredKey::Exact(key) => *key == instance.key,
        }
    }
}

impl fmt::Display for ProviderRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            RequiredKey::All => write!(f, "{}", self.config),
            RequiredKey::Exact(key) => write!(f, "{}{}", self.config, key),
        }
    }
}

/// The requirement derived from one written reference.
fn requirement_for_ref(
    reference: &ProviderRef,
    resolver: &ConfigResolver,
) -> Result<ProviderRequirement, RiggingError> {
    let block = resolver.resolve_ref(reference)?;
    let key = match &reference.key_expr {
        KeyExpr::None | KeyExpr::Dynamic => RequiredKey::All,
        KeyExpr::Static(k) => RequiredKey::Exact(InstanceKey::string(k.clone())),
    };
    Ok(ProviderRequirement {
        config: block.addr.clone(),
        key,
    })
}

/// The provider dependency set of a resource or data-source block.
///
/// Without an explicit `provider` argument the set is derived from the
/// default configuration for the type's implied provider.
pub fn resource_requirements(
    resource: &ResourceBlock,
    resolver: &ConfigResolver,
) -> Result<BTreeSet<ProviderRequirement>, RiggingError> {
    let implied;
    let reference = match &resource.provider {
        Some(reference) => reference,
        None => {
            implied = ProviderRef::default_for(resource.implied_provider_local_name());
            &implied
        }
    };
    Ok(BTreeSet::from([requirement_for_ref(reference, resolver)?]))
}

/// The provider dependency set of a module call: the union over its
/// `providers` map entries.
pub fn module_call_requirements(
    call: &ModuleCall,
    resolver: &ConfigResolver,
) -> Result<BTreeSet<ProviderRequirement>, RiggingError> {
    let mut set = BTreeSet::new();
    for reference in call.providers.values() {
        set.insert(requirement_for_ref(reference, resolver)?);
    }
    Ok(set)
}
