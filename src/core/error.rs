//! Error types for rigging.
//!
//! [`RiggingError`] enumerates every failure mode in the library, grouped
//! into the classes the rest of the system cares about:
//!
//! - **Address syntax** - malformed traversal shape, non-string index,
//!   wrong segment count; carries the offending [`SourceRange`] and is
//!   non-fatal to sibling nodes.
//! - **Repetition validation** - a provider block's repetition arguments
//!   are inconsistent (alias missing under `for_each`, `count` on a
//!   provider block).
//! - **Instance selection** - an index expression's result does not match
//!   any declared provider instance key; accumulated per consuming node.
//! - **Internal consistency** - post-expansion invariant violations that
//!   indicate a bug in graph construction, not a user mistake.
//! - **State format** - persisted-state version and decoding problems.
//!
//! [`BuildError`] is the graph-construction result type: skeleton failures
//! abort the whole build, expansion failures accumulate per node so one
//! run can report every bad index at once.

use std::fmt;

use thiserror::Error;

use crate::addrs::SourceRange;

/// The main error type for rigging operations.
#[derive(Error, Debug)]
pub enum RiggingError {
    /// A textual address did not have the expected shape.
    ///
    /// Covers missing/extra segments, a non-string index where a provider
    /// source or instance key was expected, and scanner-level failures.
    /// The range points at the offending part of the input.
    #[error("invalid provider configuration address at {range}: {message}")]
    AddressSyntax {
        /// What was wrong with the address.
        message: String,
        /// Byte range of the offending segment in the parsed input.
        range: SourceRange,
    },

    /// A provider source string (`[host/]namespace/type`) was malformed.
    #[error("invalid provider source {source_str:?}: {message}")]
    ProviderSource {
        /// The source string as written.
        source_str: String,
        /// What was wrong with it.
        message: String,
    },

    /// A provider block uses repetition but has no alias.
    ///
    /// Un-aliased provider configurations must remain singletons so that
    /// default-provider selection keeps its meaning.
    #[error("provider configuration {addr} uses for_each and must set an alias")]
    RepetitionWithoutAlias {
        /// Display address of the offending provider block.
        addr: String,
    },

    /// A provider block attempted count-based repetition.
    ///
    /// Provider instance keys are strings; integer keys from `count` are
    /// rejected rather than coerced.
    #[error("provider configuration {addr} may not use count; use for_each with string keys")]
    CountRepetitionUnsupported {
        /// Display address of the offending provider block.
        addr: String,
    },

    /// An instance-selection expression produced a non-string value.
    #[error("provider instance key for {addr} must be a string, not {got}")]
    InstanceKeyNotString {
        /// Display address of the provider block being indexed.
        addr: String,
        /// JSON type name of the evaluated value.
        got: String,
    },

    /// An instance-selection expression named a key the block does not have.
    #[error("provider configuration {addr} has no instance {key:?}; valid keys are {valid}")]
    UnknownInstanceKey {
        /// Display address of the provider block being indexed.
        addr: String,
        /// The key the expression produced.
        key: String,
        /// Comma-separated list of declared keys.
        valid: String,
    },

    /// A reference names a multi-instance provider block without an index.
    #[error("provider configuration {addr} has multiple instances; an instance key is required")]
    MissingInstanceKey {
        /// Display address of the provider block.
        addr: String,
    },

    /// An instance-selection expression depends on values only known
    /// during apply. Static expansion is required; this is never
    /// approximated.
    #[error("provider instance key for {addr} depends on values not known until apply")]
    ProviderKeyNotStatic {
        /// Display address of the provider block being indexed.
        addr: String,
    },

    /// A reference names a provider configuration that was never declared.
    #[error("reference to undeclared provider configuration {addr}")]
    UnknownProviderConfig {
        /// The local reference as written.
        addr: String,
    },

    /// Two provider blocks expanded to the same absolute instance address.
    #[error("duplicate provider instance address {addr}")]
    DuplicateProviderInstance {
        /// The colliding absolute address.
        addr: String,
    },

    /// The dependency graph contains a cycle.
    #[error("circular dependency detected: {cycle}")]
    CircularDependency {
        /// The cycle path, rendered `a -> b -> a`.
        cycle: String,
    },

    /// A post-expansion invariant did not hold.
    ///
    /// This is a defect in graph construction, not a configuration
    /// mistake, and should be reported as a bug.
    #[error("internal graph defect: {message}")]
    InternalConsistency {
        /// Description of the violated invariant.
        message: String,
    },

    /// The state file was written by a newer version of the tool.
    #[error(
        "state format version {found} is newer than supported version {supported}; \
         upgrade the tool to read this state"
    )]
    StateVersionTooNew {
        /// Version found in the file.
        found: u32,
        /// Newest version this build understands.
        supported: u32,
    },

    /// The state file content was structurally invalid.
    #[error("invalid state file: {message}")]
    StateFormat {
        /// What was wrong with the file.
        message: String,
    },

    /// I/O error from [`std::io::Error`].
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error from [`serde_json::Error`].
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RiggingError {
    /// Whether this error is an internal defect rather than a user-facing
    /// configuration problem.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::InternalConsistency { .. })
    }
}

/// One node's failure during graph expansion.
///
/// Expansion failures are attached to the node that caused them so that
/// unrelated nodes still resolve and one run reports every bad index.
#[derive(Debug)]
pub struct NodeFailure {
    /// Display form of the failing node's address.
    pub node: String,
    /// What went wrong for that node.
    pub error: RiggingError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.error)
    }
}

/// Graph-construction failure.
///
/// The skeleton passes (provider nodes, consumer nodes, attach, prune)
/// abort the whole build: no partial graph is safe to walk without its
/// provider skeleton. Expansion failures accumulate per node instead, and
/// consistency defects are surfaced distinctly.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A skeleton pass failed; the graph is unusable.
    #[error("graph construction failed: {0}")]
    Abort(#[source] RiggingError),

    /// One or more nodes failed during instance expansion.
    #[error("provider expansion failed for {} configuration node(s)", .failures.len())]
    Expansion {
        /// The per-node failures, in deterministic node order.
        failures: Vec<NodeFailure>,
    },

    /// A post-expansion invariant was violated; this is a bug.
    #[error("graph construction defect: {0}")]
    Defect(#[source] RiggingError),
}

impl BuildError {
    /// Render every accumulated failure, one per line.
    ///
    /// For [`BuildError::Expansion`] this is the full report; other
    /// variants render their single message.
    pub fn report(&self) -> String {
        match self {
            Self::Expansion { failures } => {
                let mut out = String::new();
                for failure in failures {
                    out.push_str(&failure.to_string());
                    out.push('\n');
                }
                out
            }
            other => format!("{other}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defect_errors_are_distinguishable() {
        let user = RiggingError::UnknownInstanceKey {
            addr: r#"provider["registry.rigging.dev/official/aws"]"#.to_string(),
            key: "ap".to_string(),
            valid: "\"eu\", \"us\"".to_string(),
        };
        let defect = RiggingError::InternalConsistency {
            message: "instance choice outside declared requirement set".to_string(),
        };
        assert!(!user.is_defect());
        assert!(defect.is_defect());
        assert!(defect.to_string().starts_with("internal graph defect"));
    }

    #[test]
    fn expansion_report_lists_every_failure() {
        let err = BuildError::Expansion {
            failures: vec![
                NodeFailure {
                    node: "aws_instance.a".to_string(),
                    error: RiggingError::MissingInstanceKey {
                        addr: "provider[\"registry.rigging.dev/official/aws\"].east".to_string(),
                    },
                },
                NodeFailure {
                    node: "aws_instance.b".to_string(),
                    error: RiggingError::ProviderKeyNotStatic {
                        addr: "provider[\"registry.rigging.dev/official/aws\"].east".to_string(),
                    },
                },
            ],
        };
        let report = err.report();
        assert_eq!(report.lines().count(), 2);
        assert!(report.contains("aws_instance.a"));
        assert!(report.contains("aws_instance.b"));
        assert!(err.to_string().contains("2 configuration node(s)"));
    }
}
