//! Rigging - provider addressing and dependency-graph core
//!
//! Rigging is the core library of a declarative infrastructure orchestrator:
//! it takes an already-parsed configuration describing resources, module
//! calls, and the provider plugins that manage them, and produces the
//! dependency graph that a plan/apply driver walks. The hard part it owns is
//! multi-instance provider configurations: a `provider` block may expand
//! over a statically-known collection, so a resource instance must be wired
//! to exactly one provider *instance* out of a dynamically-sized set while
//! the graph topology is still derivable before any per-instance expression
//! is evaluated.
//!
//! # Architecture Overview
//!
//! Rigging follows a parse/resolve/build model where:
//! - Addresses identify provider configurations and their instances across
//!   the current and a legacy persisted-state encoding
//! - A per-module resolver snapshot expands provider blocks into keyed
//!   instances before any graph edge exists
//! - A strictly-ordered pass pipeline attaches, prunes, expands, and
//!   finally transitively reduces the graph
//!
//! # Core Modules
//!
//! - [`addrs`] - Address algebra: local and absolute provider-instance
//!   addresses, instance keys, provider source addresses, and the parsers
//!   for the current and legacy textual forms
//! - [`config`] - Configuration data model, provider-block expansion, the
//!   per-module resolver snapshot, and the provider dependency tracker
//! - [`graph`] - The dependency graph, its construction passes, and the
//!   transitive-reduction transform
//! - [`state`] - Persisted-state encoding of per-resource and per-instance
//!   provider addresses
//! - [`core`] - Error types shared by every layer
//! - [`utils`] - File helpers used by state I/O
//!
//! # Example
//!
//! ```rust
//! use rigging::addrs::AbsProviderInstance;
//!
//! let addr = AbsProviderInstance::parse_str(
//!     r#"provider["registry.rigging.dev/official/aws"].east"#,
//! ).unwrap();
//! assert_eq!(
//!     addr.to_string(),
//!     r#"provider["registry.rigging.dev/official/aws"].east"#,
//! );
//! ```

pub mod addrs;
pub mod config;
pub mod core;
pub mod graph;
pub mod state;
pub mod utils;
