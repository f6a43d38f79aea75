//! Persisted-state encoding of provider addresses.
//!
//! State records which provider instance manages each resource instance,
//! using a compatibility scheme layered over two eras of address syntax:
//!
//! - When every instance of a resource shares one provider-instance
//!   address, that single address is stored once at the resource level -
//!   byte-for-byte what pre-multi-instance readers expect.
//! - When instances diverge (the multi-instance-provider case), the
//!   resource-level field holds the un-keyed block address and each
//!   instance carries a `provider_instance` override; on read, a present
//!   override takes precedence over the resource-level address.
//!
//! Version 1 files predate registry source addresses: their provider
//! fields use the legacy `provider.type.alias` syntax and are parsed
//! with the legacy parser, read-only. The current version is 2.
//!
//! **Compatibility boundary**: the per-instance override field is a
//! one-way step. State written with overrides cannot be read by tool
//! versions predating multi-instance providers; there is no downgrade
//! path, by design.

mod io;

use serde::{Deserialize, Serialize};

use crate::addrs::{AbsProviderInstance, InstanceKey};
use crate::config::ResourceMode;
use crate::core::RiggingError;

/// Current state format version.
pub const STATE_VERSION: u32 = 2;

/// Last version whose provider fields use the legacy address syntax.
pub const LEGACY_STATE_VERSION: u32 = 1;

/// A persisted state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// Format version; see [`STATE_VERSION`].
    pub version: u32,

    /// The recorded resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceRecord>,
}

impl StateFile {
    /// An empty state file at the current version.
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            ..Self::default()
        }
    }

    /// Whether this file's provider fields use the legacy syntax.
    pub fn is_legacy(&self) -> bool {
        self.version <= LEGACY_STATE_VERSION
    }
}

/// One resource's persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// The module instance path, rendered; absent for the root module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// Managed resource or data source.
    pub mode: ResourceMode,

    /// The resource type.
    #[serde(rename = "type")]
    pub type_name: String,

    /// The resource's configuration name.
    pub name: String,

    /// The resource-level provider address: the shared instance address
    /// when all instances agree, the un-keyed block address otherwise.
    pub provider: String,

    /// The recorded instances.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceRecord>,
}

/// One resource instance's persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// The instance key; omitted for singletons.
    #[serde(default, skip_serializing_if = "InstanceKey::is_none")]
    pub index_key: InstanceKey,

    /// Per-instance provider override, present only when this instance's
    /// provider differs from its siblings'. Takes precedence over the
    /// resource-level address on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_instance: Option<String>,
}

impl ResourceRecord {
    /// Encode the provider addresses of a resource's instances.
    ///
    /// `instances` pairs each instance key with the provider instance it
    /// uses. When all pairs share one address it is stored once at the
    /// resource level; otherwise the resource level holds the un-keyed
    /// block address and each instance an override.
    pub fn encode_provider(
        module: Option<String>,
        mode: ResourceMode,
        type_name: impl Into<String>,
        name: impl Into<String>,
        instances: &[(InstanceKey, AbsProviderInstance)],
    ) -> Result<Self, RiggingError> {
        let mut shared: Option<&AbsProviderInstance> = None;
        let mut uniform = true;
        for (_, addr) in instances {
            match shared {
                None => shared = Some(addr),
                Some(existing) => {
                    if existing.module != addr.module || existing.provider != addr.provider {
                        return Err(RiggingError::InternalConsistency {
                            message: format!(
                                "instances of one resource use different provider blocks \
                                 ({existing} vs {addr})"
                            ),
                        });
                    }
                    if existing.key != addr.key {
                        uniform = false;
                    }
                }
            }
        }
        let Some(shared) = shared else {
            return Err(RiggingError::StateFormat {
                message: "cannot encode a resource with no instances".to_string(),
            });
        };

        let (provider, overrides): (String, Vec<Option<String>>) = if uniform {
            (shared.to_string(), instances.iter().map(|_| None).collect())
        } else {
            let unkeyed = AbsProviderInstance {
                module: shared.module.clone(),
                provider: shared.provider.clone(),
                key: InstanceKey::NoKey,
            };
            (
                unkeyed.to_string(),
                instances
                    .iter()
                    .map(|(_, addr)| Some(addr.to_string()))
                    .collect(),
            )
        };

        Ok(Self {
            module,
            mode,
            type_name: type_name.into(),
            name: name.into(),
            provider,
            instances: instances
                .iter()
                .zip(overrides)
                .map(|((key, _), provider_instance)| InstanceRecord {
                    index_key: key.clone(),
                    provider_instance,
                })
                .collect(),
        })
    }

    /// Decode the provider instance address of each recorded instance,
    /// giving per-instance overrides precedence over the resource-level
    /// address.
    ///
    /// `legacy` selects the address syntax: legacy files use the
    /// attribute-only form, current files the bracket-source form.
    pub fn decode_provider(
        &self,
        legacy: bool,
    ) -> Result<Vec<(InstanceKey, AbsProviderInstance)>, RiggingError> {
        let parse = |addr: &str| {
            if legacy {
                AbsProviderInstance::parse_legacy_str(addr)
            } else {
                AbsProviderInstance::parse_str(addr)
            }
        };
        let resource_level = parse(&self.provider)?;

        self.instances
            .iter()
            .map(|instance| {
                let addr = match &instance.provider_instance {
                    Some(override_addr) => parse(override_addr)?,
                    None => resource_level.clone(),
                };
                Ok((instance.index_key.clone(), addr))
            })
            .collect()
    }
}
