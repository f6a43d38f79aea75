//! Repetition handling: expanding blocks into keyed instances.
//!
//! Repetition values arrive here already resolved by static evaluation -
//! a key/value collection, an integer count, or absent. Provider blocks
//! are held to stricter rules than other blocks: repetition requires an
//! alias (un-aliased configurations must remain singletons so default-
//! provider selection keeps its meaning), and count-based repetition is
//! rejected outright rather than inventing a string coercion for its
//! integer keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::addrs::InstanceKey;
use crate::config::ProviderBlock;
use crate::core::RiggingError;

/// A block's repetition argument, resolved at static-evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Repetition {
    /// No repetition: the block is a singleton.
    #[default]
    Single,
    /// Map-style repetition: one instance per entry, keyed by map key.
    ForEach(BTreeMap<String, Value>),
    /// Count-style repetition: instances keyed `0..count`. Valid for
    /// resources and module calls, rejected for provider blocks.
    Count(u64),
}

impl Repetition {
    /// Whether this is the singleton case.
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single)
    }
}

/// One declared instance of a provider block: its key and, for map-style
/// repetition, the collection value the instance was created for.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInstanceDecl {
    /// The instance key.
    pub key: InstanceKey,
    /// The `each.value` for this instance, when repetition produced it.
    pub each_value: Option<Value>,
}

/// Expand a provider block into its declared instances.
///
/// - Absent repetition yields exactly one instance whose key is the
///   alias (as a string key) or [`InstanceKey::NoKey`]; an alias is
///   optional.
/// - Map repetition requires an alias and yields one instance per entry,
///   keyed by map key.
/// - Count repetition is rejected.
///
/// `addr` is the block's display address, used in error messages.
pub fn expand_provider_block(
    addr: &str,
    block: &ProviderBlock,
) -> Result<Vec<ProviderInstanceDecl>, RiggingError> {
    match &block.repetition {
        Repetition::Single => {
            let key = match &block.alias {
                Some(alias) => InstanceKey::string(alias.clone()),
                None => InstanceKey::NoKey,
            };
            Ok(vec![ProviderInstanceDecl {
                key,
                each_value: None,
            }])
        }
        Repetition::ForEach(entries) => {
            if block.alias.is_none() {
                return Err(RiggingError::RepetitionWithoutAlias {
                    addr: addr.to_string(),
                });
            }
            Ok(entries
                .iter()
                .map(|(key, value)| ProviderInstanceDecl {
                    key: InstanceKey::string(key.clone()),
                    each_value: Some(value.clone()),
                })
                .collect())
        }
        Repetition::Count(_) => Err(RiggingError::CountRepetitionUnsupported {
            addr: addr.to_string(),
        }),
    }
}

/// The instance keys a consumer block (resource, data source, or module
/// call) expands into. Unlike provider blocks, consumers may use count
/// and get integer keys.
pub fn consumer_keys(repetition: &Repetition) -> Vec<InstanceKey> {
    match repetition {
        Repetition::Single => vec![InstanceKey::NoKey],
        Repetition::ForEach(entries) => entries
            .keys()
            .map(|key| InstanceKey::string(key.clone()))
            .collect(),
        Repetition::Count(n) => (0..*n).map(InstanceKey::Number).collect(),
    }
}

/// Validate an evaluated index value against a provider block's declared
/// instance keys.
///
/// The value must be a JSON string equal to one of the keys; anything
/// else is an instance-selection error naming the valid key set.
pub fn match_instance_key(
    addr: &str,
    declared: &[InstanceKey],
    value: &Value,
) -> Result<InstanceKey, RiggingError> {
    let key = match value {
        Value::String(s) => s.as_str(),
        other => {
            return Err(RiggingError::InstanceKeyNotString {
                addr: addr.to_string(),
                got: json_type_name(other).to_string(),
            });
        }
    };
    let candidate = InstanceKey::string(key);
    if declared.contains(&candidate) {
        Ok(candidate)
    } else {
        let valid = declared
            .iter()
            .filter_map(InstanceKey::as_str)
            .map(|k| format!("{k:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        Err(RiggingError::UnknownInstanceKey {
            addr: addr.to_string(),
            key: key.to_string(),
            valid,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(alias: Option<&str>, repetition: Repetition) -> ProviderBlock {
        ProviderBlock {
            local_name: "aws".to_string(),
            alias: alias.map(str::to_string),
            repetition,
        }
    }

    #[test]
    fn singleton_without_alias_has_no_key() {
        let instances = expand_provider_block("provider[\"x\"]", &block(None, Repetition::Single))
            .unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].key, InstanceKey::NoKey);
    }

    #[test]
    fn singleton_with_alias_is_keyed_by_alias() {
        let instances =
            expand_provider_block("provider[\"x\"].east", &block(Some("east"), Repetition::Single))
                .unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].key, InstanceKey::string("east"));
    }

    #[test]
    fn for_each_yields_map_keys() {
        let repetition = Repetition::ForEach(BTreeMap::from([
            ("us".to_string(), json!("us-east-1")),
            ("eu".to_string(), json!("eu-west-1")),
        ]));
        let instances =
            expand_provider_block("provider[\"x\"].east", &block(Some("east"), repetition))
                .unwrap();
        let keys: Vec<_> = instances.iter().map(|i| i.key.clone()).collect();
        assert_eq!(keys, vec![InstanceKey::string("eu"), InstanceKey::string("us")]);
        assert_eq!(instances[0].each_value, Some(json!("eu-west-1")));
    }

    #[test]
    fn for_each_without_alias_is_rejected() {
        let repetition = Repetition::ForEach(BTreeMap::from([("us".to_string(), json!(1))]));
        let err = expand_provider_block("provider[\"x\"]", &block(None, repetition)).unwrap_err();
        assert!(matches!(err, RiggingError::RepetitionWithoutAlias { .. }));
    }

    #[test]
    fn count_on_providers_is_rejected() {
        let err =
            expand_provider_block("provider[\"x\"].n", &block(Some("n"), Repetition::Count(2)))
                .unwrap_err();
        assert!(matches!(err, RiggingError::CountRepetitionUnsupported { .. }));
    }

    #[test]
    fn consumer_keys_cover_all_repetition_kinds() {
        assert_eq!(consumer_keys(&Repetition::Single), vec![InstanceKey::NoKey]);
        assert_eq!(
            consumer_keys(&Repetition::Count(3)),
            vec![
                InstanceKey::Number(0),
                InstanceKey::Number(1),
                InstanceKey::Number(2)
            ]
        );
        let map = Repetition::ForEach(BTreeMap::from([
            ("b".to_string(), json!(1)),
            ("a".to_string(), json!(2)),
        ]));
        assert_eq!(
            consumer_keys(&map),
            vec![InstanceKey::string("a"), InstanceKey::string("b")]
        );
    }

    #[test]
    fn match_accepts_declared_string_keys_only() {
        let declared = [InstanceKey::string("us"), InstanceKey::string("eu")];

        let ok = match_instance_key("provider[\"x\"].east", &declared, &json!("eu")).unwrap();
        assert_eq!(ok, InstanceKey::string("eu"));

        let missing =
            match_instance_key("provider[\"x\"].east", &declared, &json!("ap")).unwrap_err();
        match missing {
            RiggingError::UnknownInstanceKey { key, valid, .. } => {
                assert_eq!(key, "ap");
                assert!(valid.contains("\"us\""));
                assert!(valid.contains("\"eu\""));
            }
            other => panic!("expected unknown-key error, got {other:?}"),
        }

        let not_string =
            match_instance_key("provider[\"x\"].east", &declared, &json!(3)).unwrap_err();
        assert!(matches!(not_string, RiggingError::InstanceKeyNotString { got, .. } if got == "number"));
    }
}
