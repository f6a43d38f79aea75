//! Graph node identities.

use std::fmt;

use crate::addrs::{AbsProviderInstance, InstanceKey, ProviderConfigAddr};
use crate::config::{ModuleCallAddr, ResourceAddr};

/// The identity of one dependency-graph node.
///
/// Nodes are distinguished by address content only; the graph stores one
/// node per identity and deduplicates edges. Unexpanded consumer nodes
/// ([`NodeId::Resource`], [`NodeId::ModuleCall`]) coexist with the
/// per-key instance nodes they expand into, so post-expansion
/// validation can still reach the pre-expansion node's declared
/// requirement set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// A declared (or implied) provider configuration block.
    ProviderConfig(ProviderConfigAddr),
    /// One expanded instance of a provider configuration.
    ProviderInstance(AbsProviderInstance),
    /// An unexpanded resource or data-source block.
    Resource(ResourceAddr),
    /// An unexpanded module call.
    ModuleCall(ModuleCallAddr),
    /// One expanded instance of a resource block.
    ResourceInstance(ResourceAddr, InstanceKey),
    /// One expanded instance of a module call.
    ModuleCallInstance(ModuleCallAddr, InstanceKey),
}

impl NodeId {
    /// Whether this node is a provider configuration block.
    pub fn is_provider_config(&self) -> bool {
        matches!(self, Self::ProviderConfig(_))
    }

    /// Whether this node is an expanded provider instance.
    pub fn is_provider_instance(&self) -> bool {
        matches!(self, Self::ProviderInstance(_))
    }

    /// The unexpanded node an instance node was expanded from, if this
    /// is an instance node.
    pub fn unexpanded_parent(&self) -> Option<NodeId> {
        match self {
            Self::ResourceInstance(addr, _) => Some(Self::Resource(addr.clone())),
            Self::ModuleCallInstance(addr, _) => Some(Self::ModuleCall(addr.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderConfig(addr) => write!(f, "{addr}"),
            Self::ProviderInstance(addr) => write!(f, "{addr}"),
            Self::Resource(addr) => write!(f, "{addr}"),
            Self::ModuleCall(addr) => write!(f, "{addr}"),
            Self::ResourceInstance(addr, key) => write!(f, "{addr}{key}"),
            Self::ModuleCallInstance(addr, key) => write!(f, "{addr}{key}"),
        }
    }
}
