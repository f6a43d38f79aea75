//! Provider configuration and provider instance addresses.
//!
//! Three address shapes live here:
//!
//! - [`LocalProviderInstance`] - a provider reference as written inside
//!   one module, meaningless without that module's local-name table.
//! - [`ProviderConfigAddr`] - the address of a declared `provider` block
//!   before instance expansion.
//! - [`AbsProviderInstance`] - the fully-qualified address of one
//!   expanded provider instance; globally unique once expansion is
//!   complete, and the form recorded in state.
//!
//! Two textual forms are parsed. The current form carries a bracket-
//! indexed registry source and an optional alias-or-key suffix:
//!
//! ```text
//! provider["registry.rigging.dev/official/aws"]
//! provider["registry.rigging.dev/official/aws"].east
//! module.net["a"].provider["registry.rigging.dev/official/aws"]["east"]
//! ```
//!
//! The legacy form predates registry sources and dynamic module
//! instancing and survives only in old state snapshots: a bare attribute
//! type name, attribute-only alias, and no instance keys anywhere:
//!
//! ```text
//! provider.aws
//! module.net.provider.aws.east
//! ```
//!
//! The two parsers are deliberately separate functions sharing only the
//! module-prefix parser: the legacy path's no-instance-keys rule is a
//! correctness constraint, not a stylistic variation of the current
//! grammar.

use std::fmt;

use crate::addrs::instance_key::InstanceKey;
use crate::addrs::module_instance::{ModuleInstance, parse_module_instance_prefix};
use crate::addrs::provider::{BUILTIN_PROVIDER_TYPE, Provider};
use crate::addrs::traversal::{IndexValue, Traversal, TraversalStep, is_valid_identifier};
use crate::core::RiggingError;

/// A provider reference that may be module-local or absolute, or absent.
///
/// Use [`LocalProviderInstance`] or [`AbsProviderInstance`] directly
/// wherever the kind is known; this union exists for the few seams where
/// the decision cannot be made until the enclosing module's tables are
/// available, and its explicit [`ProviderInstance::None`] variant stands
/// in for "no provider reference" so absence is never a null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ProviderInstance {
    /// No provider reference was written.
    #[default]
    None,
    /// A module-local reference, not yet resolved.
    Local(LocalProviderInstance),
    /// A fully-qualified instance address.
    Abs(AbsProviderInstance),
}

impl ProviderInstance {
    /// Whether no reference was written.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The absolute address, when already resolved.
    pub fn as_abs(&self) -> Option<&AbsProviderInstance> {
        match self {
            Self::Abs(addr) => Some(addr),
            _ => None,
        }
    }
}

/// The address of a provider instance from the perspective of references
/// in a particular module.
///
/// `local_name` is the module-local provider name; mapping it to a
/// [`Provider`] requires the enclosing module's local-name table, so this
/// address is never persisted - it is resolved to an
/// [`AbsProviderInstance`] first.
///
/// The key carries either the alias of a singleton aliased configuration
/// or one key of a repeated configuration; both occupy the same slot in
/// the absolute address space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalProviderInstance {
    /// The provider's local name within the module.
    pub local_name: String,
    /// The instance key, [`InstanceKey::NoKey`] for the default instance.
    pub key: InstanceKey,
}

impl LocalProviderInstance {
    /// The default (un-aliased) instance reference for a local name.
    pub fn default_for(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            key: InstanceKey::NoKey,
        }
    }

    /// Compact form without the leading `provider.` marker, used inside
    /// per-module contexts such as `providers` maps.
    pub fn string_compact(&self) -> String {
        match key_suffix(&self.key) {
            KeySuffix::None => self.local_name.clone(),
            KeySuffix::Attr(alias) => format!("{}.{}", self.local_name, alias),
            KeySuffix::Index(idx) => format!("{}{}", self.local_name, idx),
        }
    }
}

impl fmt::Display for LocalProviderInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider.{}", self.string_compact())
    }
}

/// The address of a declared `provider` block, before instance expansion.
///
/// The alias distinguishes sibling blocks for the same provider type
/// within one module; the block's instances are addressed separately via
/// [`AbsProviderInstance`] once the block's repetition is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderConfigAddr {
    /// The module the block is declared in.
    pub module: ModuleInstance,
    /// The provider's source address.
    pub provider: Provider,
    /// The block's alias, if any.
    pub alias: Option<String>,
}

impl ProviderConfigAddr {
    /// The block-level address with no alias, in the given module.
    pub fn default_config(module: ModuleInstance, provider: Provider) -> Self {
        Self {
            module,
            provider,
            alias: None,
        }
    }

    /// The un-keyed instance address for this block, used as the
    /// resource-level address when instances diverge in state.
    pub fn unkeyed_instance(&self) -> AbsProviderInstance {
        AbsProviderInstance {
            module: self.module.clone(),
            provider: self.provider.clone(),
            key: InstanceKey::NoKey,
        }
    }
}

impl fmt::Display for ProviderConfigAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_root() {
            write!(f, "{}.", self.module)?;
        }
        write!(f, "provider[\"{}\"]", self.provider)?;
        if let Some(alias) = &self.alias {
            write!(f, ".{alias}")?;
        }
        Ok(())
    }
}

/// The fully-qualified address of one provider instance, after instance
/// expansion is complete.
///
/// Each `provider` block becomes zero or more instances, and every
/// instance across the whole configuration tree must have a distinct
/// absolute address. The key is either [`InstanceKey::NoKey`] or a
/// string: integer provider keys are rejected by the parsers and the
/// repetition resolver, a restriction kept so the key shape can be
/// generalized later without changing this type.
///
/// Equality and hashing use only `(module, provider, key)`; whether an
/// address was written with the attribute or the bracket suffix never
/// affects identity.
///
/// # Examples
///
/// ```rust
/// use rigging::addrs::AbsProviderInstance;
///
/// let attr = AbsProviderInstance::parse_str(
///     r#"provider["registry.rigging.dev/official/aws"].east"#,
/// ).unwrap();
/// let bracket = AbsProviderInstance::parse_str(
///     r#"provider["registry.rigging.dev/official/aws"]["east"]"#,
/// ).unwrap();
/// assert_eq!(attr, bracket);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsProviderInstance {
    /// The module instance the provider block is declared in.
    pub module: ModuleInstance,
    /// The provider's source address.
    pub provider: Provider,
    /// The instance key: `NoKey` or a string key.
    pub key: InstanceKey,
}

impl AbsProviderInstance {
    /// Parse the current-form absolute address from a scanned traversal.
    ///
    /// Accepts, after an optional module-instance prefix: the literal
    /// `provider` marker, a bracket-indexed provider source string, and
    /// optionally one more segment that is either an attribute alias or a
    /// bracket index whose value must be a string.
    pub fn parse(traversal: &Traversal) -> Result<Self, RiggingError> {
        let (module, first) = parse_module_instance_prefix(traversal)?;
        let remain = &traversal.steps[first..];

        check_provider_shape(traversal, remain, first)?;

        let provider = match &remain[1] {
            TraversalStep::Index {
                value: IndexValue::String(source),
                range,
            } => Provider::parse_source(source).map_err(|err| RiggingError::AddressSyntax {
                message: err.to_string(),
                range: *range,
            })?,
            TraversalStep::Index { value, range } => {
                return Err(RiggingError::AddressSyntax {
                    message: format!(
                        "provider source must be a quoted string, not a {} index",
                        value.type_name()
                    ),
                    range: *range,
                });
            }
            TraversalStep::Attr { range, .. } => {
                return Err(RiggingError::AddressSyntax {
                    message: "the \"provider\" marker must be followed by a provider source \
                              string in brackets"
                        .to_string(),
                    range: *range,
                });
            }
        };

        let key = match remain.get(2) {
            None => InstanceKey::NoKey,
            Some(TraversalStep::Attr { name, .. }) => InstanceKey::String(name.clone()),
            Some(TraversalStep::Index {
                value: IndexValue::String(key),
                ..
            }) => InstanceKey::String(key.clone()),
            Some(TraversalStep::Index { range, .. }) => {
                return Err(RiggingError::AddressSyntax {
                    message: "invalid provider instance key: must be a string".to_string(),
                    range: *range,
                });
            }
        };

        Ok(Self {
            module,
            provider,
            key,
        })
    }

    /// Parse the current-form absolute address from a string.
    pub fn parse_str(s: &str) -> Result<Self, RiggingError> {
        Self::parse(&Traversal::parse(s)?)
    }

    /// Parse the legacy-form absolute address from a scanned traversal.
    ///
    /// The legacy form appears only in historical state snapshots: the
    /// type segment is a bare attribute name mapped to a legacy
    /// placeholder provider (or to the built-in provider for the literal
    /// built-in type name), the alias must be an attribute, and module
    /// steps must not carry instance keys - legacy configurations predate
    /// dynamic module instancing, so an instanced module step is a hard
    /// parse error, not a tolerated extension.
    pub fn parse_legacy(traversal: &Traversal) -> Result<Self, RiggingError> {
        let (module, first) = parse_module_instance_prefix(traversal)?;
        for step in module.steps() {
            if !step.key.is_none() {
                return Err(RiggingError::AddressSyntax {
                    message: format!(
                        "legacy provider address cannot contain module instance key {}",
                        step.key
                    ),
                    range: traversal.range_from(0),
                });
            }
        }
        let remain = &traversal.steps[first..];

        check_provider_shape(traversal, remain, first)?;

        let provider = match &remain[1] {
            TraversalStep::Attr { name, .. } => {
                if name == BUILTIN_PROVIDER_TYPE {
                    Provider::builtin(name.clone())
                } else {
                    Provider::legacy(name.clone())
                }
            }
            TraversalStep::Index { range, .. } => {
                return Err(RiggingError::AddressSyntax {
                    message: "the \"provider\" marker must be followed by a provider type name"
                        .to_string(),
                    range: *range,
                });
            }
        };

        let key = match remain.get(2) {
            None => InstanceKey::NoKey,
            Some(TraversalStep::Attr { name, .. }) => InstanceKey::String(name.clone()),
            Some(TraversalStep::Index { range, .. }) => {
                return Err(RiggingError::AddressSyntax {
                    message: "provider type name must be followed by a configuration alias name"
                        .to_string(),
                    range: *range,
                });
            }
        };

        Ok(Self {
            module,
            provider,
            key,
        })
    }

    /// Parse the legacy-form absolute address from a string.
    pub fn parse_legacy_str(s: &str) -> Result<Self, RiggingError> {
        Self::parse_legacy(&Traversal::parse(s)?)
    }

    /// The block-level address this instance belongs to, taking the
    /// given alias (instance keys do not record the alias themselves).
    pub fn config_addr(&self, alias: Option<String>) -> ProviderConfigAddr {
        ProviderConfigAddr {
            module: self.module.clone(),
            provider: self.provider.clone(),
            alias,
        }
    }
}

impl fmt::Display for AbsProviderInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_root() {
            write!(f, "{}.", self.module)?;
        }
        write!(f, "provider[\"{}\"]", self.provider)?;
        match key_suffix(&self.key) {
            KeySuffix::None => Ok(()),
            KeySuffix::Attr(alias) => write!(f, ".{alias}"),
            KeySuffix::Index(idx) => f.write_str(&idx),
        }
    }
}

/// How a key renders at the end of a provider address.
enum KeySuffix {
    None,
    /// Attribute syntax, backward-compatible with readers that treat the
    /// suffix as a static alias identifier.
    Attr(String),
    /// General bracket-index syntax.
    Index(String),
}

fn key_suffix(key: &InstanceKey) -> KeySuffix {
    match key {
        InstanceKey::NoKey => KeySuffix::None,
        InstanceKey::String(s) if is_valid_identifier(s) => KeySuffix::Attr(s.clone()),
        other => KeySuffix::Index(other.suffix()),
    }
}

/// Shared shape check for both parsers: a `provider` marker with a type
/// segment, at most one trailing alias/key segment, and nothing after.
fn check_provider_shape(
    traversal: &Traversal,
    remain: &[TraversalStep],
    first: usize,
) -> Result<(), RiggingError> {
    let root_is_provider = matches!(
        remain.first(),
        Some(TraversalStep::Attr { name, .. }) if name == "provider"
    );
    if remain.len() < 2 || !root_is_provider {
        return Err(RiggingError::AddressSyntax {
            message: "provider address must begin with \"provider.\", followed by a provider \
                      type"
                .to_string(),
            range: traversal.range_from(first),
        });
    }
    if remain.len() > 3 {
        return Err(RiggingError::AddressSyntax {
            message: "extraneous operators after provider configuration alias".to_string(),
            range: traversal.range_from(first + 3),
        });
    }
    Ok(())
}
