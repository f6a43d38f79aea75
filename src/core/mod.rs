//! Core types shared across rigging.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** for precise handling in code
//! 2. **Actionable messages** that name the offending address and, where
//!    available, the source range of the bad reference
//!
//! User-facing misconfiguration errors and internal graph defects are kept
//! in the same enum but are clearly distinguishable: defect variants render
//! with an `internal graph defect` prefix and should be reported as bugs,
//! never as configuration mistakes.

mod error;

pub use error::{BuildError, NodeFailure, RiggingError};
