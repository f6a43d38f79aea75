//! Provider source addresses.
//!
//! A provider is identified by its registry source address,
//! `hostname/namespace/type`, e.g. `registry.rigging.dev/official/aws`.
//! Short forms written in configuration (`aws`, `official/aws`) are
//! normalized against the default registry. Two special namespaces exist
//! for compatibility: the legacy namespace `-` marks providers recovered
//! from pre-registry state snapshots whose true source is unknown, and
//! the builtin namespace holds the provider compiled into the tool
//! itself.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::RiggingError;

/// Hostname used when a source string does not name a registry.
pub const DEFAULT_REGISTRY_HOST: &str = "registry.rigging.dev";

/// Namespace used when a source string is a bare type name.
pub const DEFAULT_NAMESPACE: &str = "official";

/// Placeholder namespace for providers recovered from legacy state.
pub const LEGACY_PROVIDER_NAMESPACE: &str = "-";

/// Hostname of providers compiled into the tool.
pub const BUILTIN_PROVIDER_HOST: &str = "rigging.dev";

/// Namespace of providers compiled into the tool.
pub const BUILTIN_PROVIDER_NAMESPACE: &str = "builtin";

/// Type name of the built-in provider.
pub const BUILTIN_PROVIDER_TYPE: &str = "rigging";

/// A provider's fully-qualified source address.
///
/// Every instance expanded from one `provider` block shares the same
/// `Provider`; only the instance key varies.
///
/// # Examples
///
/// ```rust
/// use rigging::addrs::Provider;
///
/// let aws = Provider::parse_source("aws").unwrap();
/// assert_eq!(aws.to_string(), "registry.rigging.dev/official/aws");
/// assert_eq!(aws, Provider::default_type("aws"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Provider {
    /// Registry hostname.
    pub hostname: String,
    /// Registry namespace (organization).
    pub namespace: String,
    /// The provider type name, e.g. `aws`.
    pub type_name: String,
}

impl Provider {
    /// A provider at an explicit host, namespace, and type.
    pub fn new(
        hostname: impl Into<String>,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            namespace: namespace.into(),
            type_name: type_name.into(),
        }
    }

    /// The default-registry provider for a bare type name.
    pub fn default_type(type_name: impl Into<String>) -> Self {
        Self::new(DEFAULT_REGISTRY_HOST, DEFAULT_NAMESPACE, type_name)
    }

    /// A legacy placeholder provider for a type recovered from old state.
    ///
    /// Legacy providers exist only on the read path; new addresses are
    /// never written with the legacy namespace.
    pub fn legacy(type_name: impl Into<String>) -> Self {
        Self::new(DEFAULT_REGISTRY_HOST, LEGACY_PROVIDER_NAMESPACE, type_name)
    }

    /// A provider compiled into the tool.
    pub fn builtin(type_name: impl Into<String>) -> Self {
        Self::new(BUILTIN_PROVIDER_HOST, BUILTIN_PROVIDER_NAMESPACE, type_name)
    }

    /// Whether this is a legacy placeholder provider.
    pub fn is_legacy(&self) -> bool {
        self.namespace == LEGACY_PROVIDER_NAMESPACE
    }

    /// Whether this is a built-in provider.
    pub fn is_builtin(&self) -> bool {
        self.hostname == BUILTIN_PROVIDER_HOST && self.namespace == BUILTIN_PROVIDER_NAMESPACE
    }

    /// Parse a source string: `type`, `namespace/type`, or
    /// `hostname/namespace/type`.
    ///
    /// The legacy namespace `-` is not accepted in source strings; it can
    /// only be produced by the legacy state parser.
    pub fn parse_source(source: &str) -> Result<Self, RiggingError> {
        let err = |message: &str| RiggingError::ProviderSource {
            source_str: source.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = source.split('/').collect();
        let (hostname, namespace, type_name) = match parts.as_slice() {
            [type_name] => (DEFAULT_REGISTRY_HOST, DEFAULT_NAMESPACE, *type_name),
            [namespace, type_name] => (DEFAULT_REGISTRY_HOST, *namespace, *type_name),
            [hostname, namespace, type_name] => (*hostname, *namespace, *type_name),
            _ => {
                return Err(err(
                    "expected a source address of the form [hostname/]namespace/type",
                ));
            }
        };

        if hostname.is_empty() || !hostname.contains('.') && hostname != "localhost" {
            return Err(err("registry hostname must be a valid host name"));
        }
        if namespace == LEGACY_PROVIDER_NAMESPACE {
            return Err(err(
                "the legacy provider namespace \"-\" may not be written in a source address",
            ));
        }
        if !is_valid_name_part(namespace) {
            return Err(err("namespace must use letters, digits, and interior hyphens"));
        }
        if !is_valid_name_part(type_name) {
            return Err(err("type name must use letters, digits, and interior hyphens"));
        }

        Ok(Self::new(hostname, namespace, type_name))
    }

    /// Display form with the default registry host elided, for UI use.
    ///
    /// The canonical [`fmt::Display`] form always carries the full
    /// hostname so that addresses embedded in state are unambiguous.
    pub fn for_display(&self) -> String {
        if self.hostname == DEFAULT_REGISTRY_HOST {
            format!("{}/{}", self.namespace, self.type_name)
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.type_name)
    }
}

impl Serialize for Provider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Provider {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Provider::parse_source(&s).map_err(serde::de::Error::custom)
    }
}

/// Namespace and type-name parts: letters and digits with interior
/// hyphens and underscores.
fn is_valid_name_part(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(['-', '_'])
        && !s.ends_with(['-', '_'])
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_forms_normalize_to_default_registry() {
        let bare = Provider::parse_source("aws").unwrap();
        assert_eq!(bare.to_string(), "registry.rigging.dev/official/aws");

        let namespaced = Provider::parse_source("corp/internal-net").unwrap();
        assert_eq!(namespaced.hostname, DEFAULT_REGISTRY_HOST);
        assert_eq!(namespaced.namespace, "corp");
        assert_eq!(namespaced.type_name, "internal-net");

        let full = Provider::parse_source("registry.example.com/corp/net").unwrap();
        assert_eq!(full.hostname, "registry.example.com");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let p = Provider::new("registry.example.com", "corp", "net");
        assert_eq!(Provider::parse_source(&p.to_string()).unwrap(), p);
    }

    #[test]
    fn for_display_elides_default_host_only() {
        assert_eq!(Provider::default_type("aws").for_display(), "official/aws");
        let other = Provider::new("registry.example.com", "corp", "net");
        assert_eq!(other.for_display(), "registry.example.com/corp/net");
    }

    #[test]
    fn rejects_malformed_sources() {
        assert!(Provider::parse_source("").is_err());
        assert!(Provider::parse_source("a/b/c/d").is_err());
        assert!(Provider::parse_source("-/aws").is_err());
        assert!(Provider::parse_source("corp/-bad").is_err());
        assert!(Provider::parse_source("nodots/corp/net").is_err());
        assert!(Provider::parse_source("corp/has space").is_err());
    }

    #[test]
    fn special_namespaces() {
        assert!(Provider::legacy("aws").is_legacy());
        assert!(!Provider::default_type("aws").is_legacy());
        assert!(Provider::builtin(BUILTIN_PROVIDER_TYPE).is_builtin());
    }

    #[test]
    fn serde_uses_source_strings() {
        let p = Provider::default_type("aws");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"registry.rigging.dev/official/aws\"");
        let back: Provider = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
