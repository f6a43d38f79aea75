//! Configuration data model for rigging.
//!
//! The configuration parser (an external collaborator) produces one
//! [`ModuleConfig`] snapshot per module: the module's local-name table,
//! its declared `provider` blocks, and the resource, data-source, and
//! module-call blocks that consume providers. Snapshots are plain
//! immutable data - no ambient globals - and serde-enabled so test
//! fixtures and tooling can move them around as JSON.
//!
//! Three services are layered on top of the model:
//!
//! - [`repetition`](self) - expanding a provider block's repetition into
//!   its instance keys and validating index values against them
//! - [`ConfigResolver`] - the per-module resolution snapshot answering
//!   local-name and instance-key queries
//! - [`requirements`](self) - the provider dependency tracker, deriving
//!   each unexpanded block's declared provider requirement set

mod repetition;
mod requirements;
mod resolver;

pub use repetition::{
    ProviderInstanceDecl, Repetition, consumer_keys, expand_provider_block, match_instance_key,
};
pub use requirements::{
    ProviderRequirement, RequiredKey, module_call_requirements, resource_requirements,
};
pub use resolver::{ConfigResolver, ResolvedProviderBlock};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::addrs::{InstanceKey, ModuleInstance, Provider};
use crate::core::RiggingError;

/// One module's parsed configuration, as handed over by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// The module instance this snapshot describes; root for the top
    /// level.
    #[serde(default)]
    pub module: ModuleInstance,

    /// Local provider name to source address, from the module's
    /// `required_providers` table.
    #[serde(default)]
    pub required_providers: BTreeMap<String, Provider>,

    /// Declared `provider` blocks.
    #[serde(default)]
    pub providers: Vec<ProviderBlock>,

    /// Managed resources and data sources.
    #[serde(default)]
    pub resources: Vec<ResourceBlock>,

    /// Module calls.
    #[serde(default)]
    pub module_calls: Vec<ModuleCall>,
}

impl ModuleConfig {
    /// The provider for a local name, falling back to the default
    /// registry source for names missing from the table (an implied
    /// provider requirement).
    pub fn provider_for_local_name(&self, local_name: &str) -> Provider {
        self.required_providers
            .get(local_name)
            .cloned()
            .unwrap_or_else(|| Provider::default_type(local_name))
    }
}

/// A declared `provider` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderBlock {
    /// The provider's local name, e.g. `aws`.
    pub local_name: String,

    /// The block's alias. Mandatory when `repetition` is map-based,
    /// optional otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The block's repetition argument, resolved at static-evaluation
    /// time by the expression runtime.
    #[serde(default)]
    pub repetition: Repetition,
}

/// Whether a resource block manages infrastructure or only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// A managed resource.
    Managed,
    /// A data source.
    Data,
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed => f.write_str("managed"),
            Self::Data => f.write_str("data"),
        }
    }
}

/// A resource or data-source block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBlock {
    /// Managed resource or data source.
    pub mode: ResourceMode,

    /// The resource type, e.g. `aws_instance`.
    pub type_name: String,

    /// The block's configuration name.
    pub name: String,

    /// The explicit `provider = ...` argument, if written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,

    /// The block's own repetition argument.
    #[serde(default)]
    pub repetition: Repetition,
}

impl ResourceBlock {
    /// The local provider name implied by the resource type when no
    /// explicit `provider` argument is written: the type name up to the
    /// first underscore.
    pub fn implied_provider_local_name(&self) -> &str {
        self.type_name
            .split_once('_')
            .map_or(self.type_name.as_str(), |(prefix, _)| prefix)
    }

    /// This block's address within `module`.
    pub fn addr(&self, module: &ModuleInstance) -> ResourceAddr {
        ResourceAddr {
            module: module.clone(),
            mode: self.mode,
            type_name: self.type_name.clone(),
            name: self.name.clone(),
        }
    }
}

/// A module call block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCall {
    /// The call name.
    pub name: String,

    /// The `providers = { ... }` mapping: child-local compact address to
    /// the parent-module reference passed in.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<String, ProviderRef>,

    /// The call's repetition argument.
    #[serde(default)]
    pub repetition: Repetition,
}

impl ModuleCall {
    /// This call's address within `module`.
    pub fn addr(&self, module: &ModuleInstance) -> ModuleCallAddr {
        ModuleCallAddr {
            module: module.clone(),
            name: self.name.clone(),
        }
    }
}

/// The address of a resource or data-source block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceAddr {
    /// The module the block is declared in.
    pub module: ModuleInstance,
    /// Managed resource or data source.
    pub mode: ResourceMode,
    /// The resource type.
    pub type_name: String,
    /// The configuration name.
    pub name: String,
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_root() {
            write!(f, "{}.", self.module)?;
        }
        if self.mode == ResourceMode::Data {
            f.write_str("data.")?;
        }
        write!(f, "{}.{}", self.type_name, self.name)
    }
}

/// The address of a module call block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleCallAddr {
    /// The module the call is declared in.
    pub module: ModuleInstance,
    /// The call name.
    pub name: String,
}

impl fmt::Display for ModuleCallAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_root() {
            write!(f, "{}.", self.module)?;
        }
        write!(f, "module.{}", self.name)
    }
}

/// A written `provider = type.alias[index]` argument, or one entry of a
/// module call's `providers` map.
///
/// The index expression is carried in whatever static form the loader
/// could give it: absent, a statically-known string, or dynamic (it
/// references per-instance symbols such as `each.key` and can only be
/// evaluated once the consuming block's own instances exist).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRef {
    /// The provider's local name.
    pub local_name: String,

    /// The alias segment, if written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The index expression, as statically known.
    #[serde(default)]
    pub key_expr: KeyExpr,
}

impl ProviderRef {
    /// A bare reference to the default configuration of a local name.
    pub fn default_for(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            alias: None,
            key_expr: KeyExpr::None,
        }
    }

    /// An aliased reference without an index.
    pub fn aliased(local_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            alias: Some(alias.into()),
            key_expr: KeyExpr::None,
        }
    }

    /// Parse the compact reference form used in `providers` maps:
    /// `name`, `name.alias`, or `name.alias["key"]`.
    pub fn parse_compact(s: &str) -> Result<Self, RiggingError> {
        use crate::addrs::{IndexValue, Traversal, TraversalStep};

        let traversal = Traversal::parse(s)?;
        let mut steps = traversal.steps.iter();
        let local_name = match steps.next() {
            Some(TraversalStep::Attr { name, .. }) => name.clone(),
            _ => unreachable!("scanner guarantees a leading attribute"),
        };
        let mut reference = Self::default_for(local_name);
        for step in steps {
            match step {
                TraversalStep::Attr { name, range } => {
                    if reference.alias.is_some() || !matches!(reference.key_expr, KeyExpr::None) {
                        return Err(RiggingError::AddressSyntax {
                            message: "extraneous segment after provider alias".to_string(),
                            range: *range,
                        });
                    }
                    reference.alias = Some(name.clone());
                }
                TraversalStep::Index { value, range } => {
                    if !matches!(reference.key_expr, KeyExpr::None) {
                        return Err(RiggingError::AddressSyntax {
                            message: "extraneous index after provider instance key".to_string(),
                            range: *range,
                        });
                    }
                    match value {
                        IndexValue::String(key) => {
                            reference.key_expr = KeyExpr::Static(key.clone());
                        }
                        IndexValue::Number(_) => {
                            return Err(RiggingError::AddressSyntax {
                                message: "invalid provider instance key: must be a string"
                                    .to_string(),
                                range: *range,
                            });
                        }
                    }
                }
            }
        }
        Ok(reference)
    }

    /// The compact display form of this reference.
    pub fn string_compact(&self) -> String {
        let mut out = self.local_name.clone();
        if let Some(alias) = &self.alias {
            out.push('.');
            out.push_str(alias);
        }
        match &self.key_expr {
            KeyExpr::None => {}
            KeyExpr::Static(key) => out.push_str(&InstanceKey::string(key.clone()).suffix()),
            KeyExpr::Dynamic => out.push_str("[each.key]"),
        }
        out
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_compact())
    }
}

/// The static knowledge about an index expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum KeyExpr {
    /// No index expression was written.
    #[default]
    None,
    /// The expression resolved to this string at static-evaluation time.
    Static(String),
    /// The expression references per-instance values and cannot be
    /// resolved until the consuming block expands.
    Dynamic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implied_provider_name_is_type_prefix() {
        let block = ResourceBlock {
            mode: ResourceMode::Managed,
            type_name: "aws_instance".to_string(),
            name: "web".to_string(),
            provider: None,
            repetition: Repetition::Single,
        };
        assert_eq!(block.implied_provider_local_name(), "aws");

        let bare = ResourceBlock {
            type_name: "random".to_string(),
            ..block
        };
        assert_eq!(bare.implied_provider_local_name(), "random");
    }

    #[test]
    fn resource_addr_display() {
        let module = ModuleInstance::root().child("net", InstanceKey::string("a"));
        let managed = ResourceAddr {
            module: ModuleInstance::root(),
            mode: ResourceMode::Managed,
            type_name: "aws_instance".to_string(),
            name: "web".to_string(),
        };
        assert_eq!(managed.to_string(), "aws_instance.web");

        let data = ResourceAddr {
            module,
            mode: ResourceMode::Data,
            type_name: "aws_ami".to_string(),
            name: "latest".to_string(),
        };
        assert_eq!(
            data.to_string(),
            "module.net[\"a\"].data.aws_ami.latest"
        );
    }

    #[test]
    fn compact_provider_ref_parses() {
        let bare = ProviderRef::parse_compact("aws").unwrap();
        assert_eq!(bare, ProviderRef::default_for("aws"));

        let aliased = ProviderRef::parse_compact("aws.east").unwrap();
        assert_eq!(aliased, ProviderRef::aliased("aws", "east"));

        let keyed = ProviderRef::parse_compact(r#"aws.east["us"]"#).unwrap();
        assert_eq!(keyed.key_expr, KeyExpr::Static("us".to_string()));
        assert_eq!(keyed.string_compact(), r#"aws.east["us"]"#);
    }

    #[test]
    fn compact_provider_ref_rejects_bad_shapes() {
        assert!(ProviderRef::parse_compact("aws.east.more").is_err());
        assert!(ProviderRef::parse_compact("aws.east[0]").is_err());
        assert!(ProviderRef::parse_compact(r#"aws.east["a"]["b"]"#).is_err());
    }

    #[test]
    fn module_config_falls_back_to_default_provider() {
        let mut config = ModuleConfig::default();
        config
            .required_providers
            .insert("aws".to_string(), Provider::new("registry.example.com", "corp", "aws"));
        assert_eq!(
            config.provider_for_local_name("aws").hostname,
            "registry.example.com"
        );
        assert_eq!(
            config.provider_for_local_name("random"),
            Provider::default_type("random")
        );
    }
}
