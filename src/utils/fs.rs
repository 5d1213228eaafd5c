//! File system operations with atomic writes.
//!
//! State files written here are the source of idempotency across runs, so
//! writes go through a temp-file-then-rename sequence: a crash mid-write
//! leaves the previous file intact and the next run reloads it unchanged.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Ensure a directory exists, creating it and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!(
            "Path exists but is not a directory: {}",
            path.display()
        ));
    }
    Ok(())
}

/// Write `content` to `path` atomically.
///
/// Writes to a sibling `.tmp` file, syncs it, then renames over the target.
/// The parent directory is created if needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to move temp file into place: {} -> {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Write a string to `path` atomically.
pub fn atomic_write_string(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}
