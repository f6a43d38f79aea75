//! Address algebra for provider configurations and their instances.
//!
//! Everything that identifies a provider configuration lives here: the
//! instance-key discriminator, provider registry source addresses, module
//! instance paths, and the local/absolute provider-instance address types
//! with their current-form and legacy-form parsers.
//!
//! Address values are plain data: construction during parsing, immutable
//! afterwards, with equality and hashing on content only. Display forms
//! are canonical - parsing a rendered address yields an equal value - but
//! never part of identity, because the same instance key can be written
//! in both the attribute and the bracket syntax.

mod instance_key;
mod module_instance;
mod provider;
mod provider_config;
mod traversal;


pub use instance_key::InstanceKey;
pub use module_instance::{ModuleInstance, ModuleInstanceStep, parse_module_instance_prefix};
pub use provider::{
    BUILTIN_PROVIDER_HOST, BUILTIN_PROVIDER_NAMESPACE, BUILTIN_PROVIDER_TYPE,
    DEFAULT_NAMESPACE, DEFAULT_REGISTRY_HOST, LEGACY_PROVIDER_NAMESPACE, Provider,
};
pub use provider_config::{
    AbsProviderInstance, LocalProviderInstance, ProviderConfigAddr, ProviderInstance,
};
pub use traversal::{
    IndexValue, SourceRange, Traversal, TraversalStep, is_valid_identifier,
};
