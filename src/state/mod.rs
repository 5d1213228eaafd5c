//! Persisted assignment state, shared by the port allocator and the mount
//! path resolver.
//!
//! Each state file is JSON of the shape `{"assignments": {label: ...}}`,
//! living under the per-project state directory. Files are safe to delete:
//! the next run simply re-derives fresh assignments (port numbers may then
//! change). Saving is read-merge-write — only the `assignments` field is
//! replaced, any sibling fields another tool version may have written are
//! preserved — and goes through the atomic write helper so a crash
//! mid-save never corrupts previously-saved state.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::LaceError;
use crate::utils::fs::atomic_write_string;

/// Load the `assignments` map from a state file.
///
/// A missing or empty file yields an empty map. A present but unparseable
/// file is a [`LaceError::StateParseError`] so the user is told which file
/// to delete.
pub fn load_assignments<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read state file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let root: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| LaceError::StateParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let Some(assignments) = root.get("assignments") else {
        return Ok(BTreeMap::new());
    };

    let map = serde_json::from_value(assignments.clone()).map_err(|e| {
        LaceError::StateParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(map)
}

/// Persist the `assignments` map to a state file, read-merge-write.
pub fn save_assignments<T: Serialize>(path: &Path, assignments: &BTreeMap<String, T>) -> Result<()> {
    let mut root = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read state file: {}", path.display()))?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };

    if !root.is_object() {
        root = serde_json::json!({});
    }

    root["assignments"] = serde_json::to_value(assignments)
        .with_context(|| "Failed to serialize assignments")?;

    let rendered = serde_json::to_string_pretty(&root)
        .with_context(|| "Failed to serialize state file")?;

    atomic_write_string(path, &rendered)
        .with_context(|| format!("Failed to write state file: {}", path.display()))?;

    tracing::debug!(
        "Saved {} assignment(s) to {}",
        assignments.len(),
        path.display()
    );

    Ok(())
}
