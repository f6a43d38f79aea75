//! I/O operations for state loading and saving.
//!
//! Loading tolerates a missing file (fresh working directory) by
//! returning an empty current-version state. Saving always writes the
//! current format version atomically, so a crash mid-write never leaves
//! a truncated state file behind.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::RiggingError;
use crate::utils::fs::atomic_write;

use super::{LEGACY_STATE_VERSION, STATE_VERSION, StateFile};

impl StateFile {
    /// Load a state file from disk.
    ///
    /// Returns an empty current-version state if the file doesn't exist.
    /// Files written by a newer tool version are refused rather than
    /// misread.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read state file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            return Err(RiggingError::StateVersionTooNew {
                found: state.version,
                supported: STATE_VERSION,
            })
            .with_context(|| format!("unsupported state file: {}", path.display()));
        }
        if state.version < LEGACY_STATE_VERSION {
            return Err(RiggingError::StateFormat {
                message: format!("state version {} was never produced", state.version),
            })
            .with_context(|| format!("invalid state file: {}", path.display()));
        }

        tracing::debug!(
            path = %path.display(),
            version = state.version,
            resources = state.resources.len(),
            "loaded state"
        );
        Ok(state)
    }

    /// Save the state file atomically.
    ///
    /// Only current-version states are writable: the legacy format is
    /// read-only, and a legacy state must be re-encoded (its provider
    /// addresses rewritten in the current syntax) before it can be
    /// saved. There is no way to write the legacy format back out.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.version != STATE_VERSION {
            return Err(RiggingError::StateFormat {
                message: format!(
                    "refusing to write state version {}; re-encode to version {} first",
                    self.version, STATE_VERSION
                ),
            })
            .with_context(|| format!("cannot save state file: {}", path.display()));
        }

        let mut content =
            serde_json::to_string_pretty(self).context("failed to serialize state")?;
        content.push('\n');
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("failed to write state file: {}", path.display()))
    }
}
