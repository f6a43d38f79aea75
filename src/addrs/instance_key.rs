//! Instance keys for expansion-produced objects.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The discriminator distinguishing one expansion-produced instance from
/// its siblings.
///
/// Resource and module instances may be keyed by strings (`for_each`) or
/// integers (`count`); a singleton carries [`InstanceKey::NoKey`].
/// Provider instances are deliberately restricted to `NoKey` or string
/// keys - the restriction lives in the address parsers and the repetition
/// resolver rather than in this type, so the general key shape can grow
/// later without reworking every address.
///
/// Equality and the canonical display form are what matter; ordering
/// exists only to keep collections deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    /// The singleton key: the object was not expanded.
    #[default]
    NoKey,
    /// A string key from a map-style repetition or a literal alias.
    String(String),
    /// An integer key from count-style repetition.
    Number(u64),
}

impl InstanceKey {
    /// Convenience constructor for a string key.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Whether this is the singleton [`InstanceKey::NoKey`].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::NoKey)
    }

    /// The key as a string slice, when it is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical bracket-index suffix: empty for `NoKey`, `["k"]` for
    /// string keys, `[3]` for integer keys.
    pub fn suffix(&self) -> String {
        match self {
            Self::NoKey => String::new(),
            Self::String(s) => format!("[\"{}\"]", escape_string_key(s)),
            Self::Number(n) => format!("[{n}]"),
        }
    }
}

/// Escape a string key with exactly the escapes the traversal scanner
/// understands, so canonical display always re-parses to the same key.
fn escape_string_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix())
    }
}

impl Serialize for InstanceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NoKey => serializer.serialize_unit(),
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_u64(*n),
        }
    }
}

struct InstanceKeyVisitor;

impl<'de> Visitor<'de> for InstanceKeyVisitor {
    type Value = InstanceKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a string, or an unsigned integer")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(InstanceKey::NoKey)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(InstanceKey::NoKey)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(InstanceKeyVisitor)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(InstanceKey::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(InstanceKey::String(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(InstanceKey::Number(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(InstanceKey::Number)
            .map_err(|_| E::custom("instance key integers must be non-negative"))
    }
}

impl<'de> Deserialize<'de> for InstanceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(InstanceKeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(InstanceKey::NoKey.to_string(), "");
        assert_eq!(InstanceKey::string("us").to_string(), "[\"us\"]");
        assert_eq!(InstanceKey::Number(2).to_string(), "[2]");
    }

    #[test]
    fn serde_round_trip() {
        for key in [
            InstanceKey::NoKey,
            InstanceKey::string("eu"),
            InstanceKey::Number(7),
        ] {
            let json = serde_json::to_string(&key).unwrap();
            let back: InstanceKey = serde_json::from_str(&json).unwrap();
            assert_eq!(back, key);
        }
        assert_eq!(serde_json::to_string(&InstanceKey::NoKey).unwrap(), "null");
    }

    #[test]
    fn rejects_negative_integers() {
        assert!(serde_json::from_str::<InstanceKey>("-1").is_err());
    }
}
