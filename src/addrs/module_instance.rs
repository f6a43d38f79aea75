//! Module instance paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::addrs::instance_key::InstanceKey;
use crate::addrs::traversal::{IndexValue, SourceRange, Traversal, TraversalStep};
use crate::core::RiggingError;

/// One step of a module instance path: a module call name plus the
/// instance key selecting one expansion of that call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleInstanceStep {
    /// The module call name.
    pub name: String,
    /// The instance key; [`InstanceKey::NoKey`] for an un-expanded call.
    pub key: InstanceKey,
}

/// The address of one instance of a module, as a path of instanced call
/// steps from the root module.
///
/// The root module is the empty path. Unlike provider instance keys,
/// module instance keys may be strings or integers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleInstance {
    steps: Vec<ModuleInstanceStep>,
}

impl ModuleInstance {
    /// The root module path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the root module.
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// The path extended by one more call step.
    pub fn child(&self, name: impl Into<String>, key: InstanceKey) -> Self {
        let mut steps = self.steps.clone();
        steps.push(ModuleInstanceStep {
            name: name.into(),
            key,
        });
        Self { steps }
    }

    /// The call steps from the root, outermost first.
    pub fn steps(&self) -> &[ModuleInstanceStep] {
        &self.steps
    }
}

impl FromIterator<ModuleInstanceStep> for ModuleInstance {
    fn from_iter<T: IntoIterator<Item = ModuleInstanceStep>>(iter: T) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.steps {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "module.{}{}", step.name, step.key)?;
        }
        Ok(())
    }
}

/// Parse the `module.<name>[<key>].` prefix steps of a traversal,
/// returning the module path and the index of the first unconsumed step.
///
/// This prefix parser is shared by the current and legacy provider
/// address parsers; the legacy parser applies its stricter no-instance-
/// keys rule on the returned path itself.
pub fn parse_module_instance_prefix(
    traversal: &Traversal,
) -> Result<(ModuleInstance, usize), RiggingError> {
    let steps = &traversal.steps;
    let mut module = ModuleInstance::root();
    let mut i = 0;

    while let Some(TraversalStep::Attr { name, range }) = steps.get(i) {
        if name != "module" {
            break;
        }
        let name_range = *range;
        i += 1;
        let call_name = match steps.get(i) {
            Some(TraversalStep::Attr { name, .. }) => name.clone(),
            Some(other) => {
                return Err(RiggingError::AddressSyntax {
                    message: "the \"module\" keyword must be followed by a module name".to_string(),
                    range: other.range(),
                });
            }
            None => {
                return Err(RiggingError::AddressSyntax {
                    message: "the \"module\" keyword must be followed by a module name".to_string(),
                    range: SourceRange::new(name_range.end, name_range.end),
                });
            }
        };
        i += 1;
        let key = match steps.get(i) {
            Some(TraversalStep::Index { value, .. }) => {
                i += 1;
                match value {
                    IndexValue::String(s) => InstanceKey::String(s.clone()),
                    IndexValue::Number(n) => InstanceKey::Number(*n),
                }
            }
            _ => InstanceKey::NoKey,
        };
        module = module.child(call_name, key);
    }

    Ok((module, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_displays_empty() {
        assert_eq!(ModuleInstance::root().to_string(), "");
        assert!(ModuleInstance::root().is_root());
    }

    #[test]
    fn nested_display() {
        let m = ModuleInstance::root()
            .child("net", InstanceKey::string("a"))
            .child("subnet", InstanceKey::NoKey)
            .child("leaf", InstanceKey::Number(0));
        assert_eq!(m.to_string(), "module.net[\"a\"].module.subnet.module.leaf[0]");
    }

    #[test]
    fn prefix_parse_consumes_module_steps_only() {
        let t = Traversal::parse(r#"module.net["a"].module.subnet.provider["aws"].x"#).unwrap();
        let (module, rest) = parse_module_instance_prefix(&t).unwrap();
        assert_eq!(module.steps().len(), 2);
        assert_eq!(module.steps()[0].name, "net");
        assert_eq!(module.steps()[0].key, InstanceKey::string("a"));
        assert_eq!(module.steps()[1].key, InstanceKey::NoKey);
        assert_eq!(rest, 5);
        assert!(matches!(
            &t.steps[rest],
            TraversalStep::Attr { name, .. } if name == "provider"
        ));
    }

    #[test]
    fn no_prefix_when_root_is_not_module() {
        let t = Traversal::parse("provider.aws").unwrap();
        let (module, rest) = parse_module_instance_prefix(&t).unwrap();
        assert!(module.is_root());
        assert_eq!(rest, 0);
    }

    #[test]
    fn bare_module_keyword_is_an_error() {
        let t = Traversal::parse("module").unwrap();
        assert!(parse_module_instance_prefix(&t).is_err());
        let t = Traversal::parse(r#"module["k"]"#).unwrap();
        assert!(parse_module_instance_prefix(&t).is_err());
    }
}
