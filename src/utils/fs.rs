//! File system helpers for safe state persistence.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Create a directory and all of its parents if they don't exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Atomically write bytes to a file using a write-then-rename strategy.
///
/// The content is written to a `.tmp` sibling, synced to disk, and then
/// renamed over the target, so readers never observe a partially written
/// file. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().context("failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to rename temp file to: {}", path.display()))
}

/// Atomically write a string to a file.
///
/// Convenience wrapper around [`atomic_write`] for text content.
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}
