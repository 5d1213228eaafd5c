//! User settings and lace directory layout.
//!
//! Settings live in `~/.lace/settings.toml` and currently carry one thing:
//! per-label mount source overrides. An override replaces the derived
//! default path for that label verbatim; the path must already exist and is
//! never auto-created.
//!
//! ```toml
//! [mounts."wezterm-server/config"]
//! source = "~/dotfiles/wezterm"
//! ```
//!
//! The lace directory also hosts per-project mount areas and state files:
//!
//! ```text
//! ~/.lace/
//!   settings.toml
//!   <projectId>/
//!     mounts/<namespace>/<name>/   derived default mount sources
//!     state/ports.json             persisted port assignments
//!     state/mounts.json            persisted mount assignments
//! ```
//!
//! The location can be overridden with the `LACE_CONFIG_DIR` environment
//! variable, which tests use for isolation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::LACE_DIR_NAME;

/// Root of the lace configuration directory.
///
/// Honors `LACE_CONFIG_DIR` when set; otherwise `~/.lace` (the local data
/// directory on Windows).
pub fn lace_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LACE_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let config_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("lace")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(LACE_DIR_NAME)
    };

    Ok(config_dir)
}

/// Per-project state directory (persisted port and mount assignments).
pub fn project_state_dir(project_id: &str) -> Result<PathBuf> {
    Ok(lace_config_dir()?.join(project_id).join("state"))
}

/// Per-project root for derived default mount sources.
///
/// All worktrees of one repository share one project ID and therefore one
/// mount area.
pub fn project_mounts_dir(project_id: &str) -> Result<PathBuf> {
    Ok(lace_config_dir()?.join(project_id).join("mounts"))
}

/// A user-configured source override for one mount label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountOverride {
    /// Host path to use instead of the derived default. Tilde-expanded on
    /// resolution; must already exist.
    pub source: String,
}

/// Contents of `~/.lace/settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Mount source overrides, keyed by `namespace/name` label.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mounts: HashMap<String, MountOverride>,
}

impl Settings {
    /// Create empty settings (no overrides).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default on-disk location of the settings file.
    pub fn default_path() -> Result<PathBuf> {
        Ok(lace_config_dir()?.join("settings.toml"))
    }

    /// Load settings from a specific path, returning defaults if the file
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings file: {}", path.display()))?;

        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid settings file syntax in {}", path.display()))?;

        tracing::debug!(
            "Loaded settings from {} ({} mount override(s))",
            path.display(),
            settings.mounts.len()
        );

        Ok(settings)
    }

    /// Load settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// The override source for `label`, tilde-expanded, if one is set.
    #[must_use]
    pub fn mount_override(&self, label: &str) -> Option<PathBuf> {
        self.mounts
            .get(label)
            .map(|o| PathBuf::from(shellexpand::tilde(&o.source).into_owned()))
    }
}
