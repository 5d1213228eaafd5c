//! Stable host-path assignment for mount labels.
//!
//! The resolver owns a per-project persisted mapping `label → host path`.
//! Default paths derive deterministically from the project identifier and
//! the label's two halves (`<lace-root>/<projectId>/mounts/<ns>/<name>`)
//! and are auto-created. A settings override replaces the derivation
//! verbatim and is never auto-created; a missing override path is a hard
//! failure telling the user to create it or remove the override.
//!
//! The project identifier comes from the workspace's git identity — the
//! repository, not a worktree — so all worktrees of one repository share
//! one default mount area. When a loaded default-derived assignment embeds
//! a different project identifier (the repository was renamed or
//! reclassified), it is discarded at construction with a warning and
//! re-derived fresh; override assignments are always preserved.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::constants::MOUNT_STATE_FILE;
use crate::core::{Label, LaceError};
use crate::metadata::MountDeclaration;
use crate::state;
use crate::utils::fs::ensure_dir;


/// One persisted mount assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MountAssignment {
    /// The `namespace/name` label this path is bound to.
    pub label: String,
    /// Absolute host path serving as the mount source.
    pub resolved_source: String,
    /// Whether the path came from a settings override. Overrides are never
    /// auto-regenerated or discarded by staleness checks.
    pub is_override: bool,
    /// When the assignment was first made.
    pub assigned_at: DateTime<Utc>,
}

/// Per-project mount path resolver with persisted idempotency.
pub struct MountPathResolver {
    workspace_folder: PathBuf,
    lace_root: PathBuf,
    project_id: String,
    state_path: PathBuf,
    settings: Settings,
    declarations: BTreeMap<String, MountDeclaration>,
    assignments: BTreeMap<String, MountAssignment>,
    warnings: Vec<String>,
}

impl MountPathResolver {
    /// Construct for a project under the default lace root.
    ///
    /// `declarations` may be empty, in which case no declaration-membership
    /// check is performed and any well-formed label is legal.
    pub fn new(
        workspace_folder: &Path,
        project_id: &str,
        settings: Settings,
        declarations: BTreeMap<String, MountDeclaration>,
    ) -> Result<Self> {
        Self::with_root(
            crate::config::lace_config_dir()?,
            workspace_folder,
            project_id,
            settings,
            declarations,
        )
    }

    /// Construct with an explicit lace root directory. Loads persisted
    /// assignments and runs staleness detection before any resolution.
    pub fn with_root(
        lace_root: PathBuf,
        workspace_folder: &Path,
        project_id: &str,
        settings: Settings,
        declarations: BTreeMap<String, MountDeclaration>,
    ) -> Result<Self> {
        let state_path = lace_root
            .join(project_id)
            .join("state")
            .join(MOUNT_STATE_FILE);
        let assignments = state::load_assignments(&state_path)
            .with_context(|| "Failed to load mount assignment state")?;

        let mut resolver = Self {
            workspace_folder: workspace_folder.to_path_buf(),
            lace_root,
            project_id: project_id.to_string(),
            state_path,
            settings,
            declarations,
            assignments,
            warnings: Vec::new(),
        };
        resolver.discard_stale_assignments();
        Ok(resolver)
    }

    /// Whether any declarations are active (membership checks enabled).
    #[must_use]
    pub fn has_declarations(&self) -> bool {
        !self.declarations.is_empty()
    }

    /// All current assignments, keyed by label.
    #[must_use]
    pub fn assignments(&self) -> &BTreeMap<String, MountAssignment> {
        &self.assignments
    }

    /// Warnings emitted so far (staleness repairs).
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Resolve the host source path for `label`.
    ///
    /// Cached assignments (from this run or loaded state) win; then a
    /// settings override, which must already exist on the host; then the
    /// deterministic default derivation, auto-created with mkdir -p
    /// semantics.
    pub fn resolve_source(&mut self, label: &str) -> Result<PathBuf> {
        self.check_label(label)?;

        if let Some(existing) = self.assignments.get(label) {
            let path = PathBuf::from(&existing.resolved_source);
            if !existing.is_override {
                ensure_dir(&path)?;
            }
            return Ok(path);
        }

        if let Some(override_path) = self.settings.mount_override(label) {
            let absolute = if override_path.is_absolute() {
                override_path
            } else {
                self.workspace_folder.join(override_path)
            };
            if !absolute.exists() {
                return Err(LaceError::OverridePathMissing {
                    label: label.to_string(),
                    path: absolute.display().to_string(),
                }
                .into());
            }
            tracing::debug!("Mount '{label}' overridden to {}", absolute.display());
            self.record(label, &absolute, true);
            return Ok(absolute);
        }

        let parsed = Label::parse(label)?;
        let derived = self
            .mounts_root()
            .join(&parsed.namespace)
            .join(&parsed.name);
        ensure_dir(&derived)?;
        tracing::debug!("Mount '{label}' derived to {}", derived.display());
        self.record(label, &derived, false);
        Ok(derived)
    }

    /// The declared container path for `label`, verbatim. Touches no
    /// filesystem state.
    pub fn resolve_target(&self, label: &str) -> Result<String> {
        self.check_label(label)?;
        self.declarations
            .get(label)
            .map(|d| d.target.clone())
            .ok_or_else(|| self.undeclared(label).into())
    }

    /// Compose the full bind-mount specification string for `label`:
    /// `source=...,target=...,type=...[,readonly][,consistency=...]`.
    pub fn resolve_full_spec(&mut self, label: &str) -> Result<String> {
        let source = self.resolve_source(label)?;
        let declaration = self
            .declarations
            .get(label)
            .ok_or_else(|| anyhow::Error::from(self.undeclared(label)))?;

        let mut spec = format!(
            "source={},target={},type={}",
            source.display(),
            declaration.target,
            declaration.mount_type.as_deref().unwrap_or("bind")
        );
        if declaration.readonly == Some(true) {
            spec.push_str(",readonly");
        }
        if let Some(consistency) = &declaration.consistency {
            spec.push_str(",consistency=");
            spec.push_str(consistency);
        }
        Ok(spec)
    }

    /// Persist the full assignment map to the project state file.
    pub fn save(&self) -> Result<()> {
        state::save_assignments(&self.state_path, &self.assignments)
    }

    fn mounts_root(&self) -> PathBuf {
        self.lace_root.join(&self.project_id).join("mounts")
    }

    fn record(&mut self, label: &str, path: &Path, is_override: bool) {
        self.assignments.insert(
            label.to_string(),
            MountAssignment {
                label: label.to_string(),
                resolved_source: path.display().to_string(),
                is_override,
                assigned_at: Utc::now(),
            },
        );
    }

    fn check_label(&self, label: &str) -> Result<(), LaceError> {
        Label::parse(label)?;
        if !self.declarations.is_empty() && !self.declarations.contains_key(label) {
            return Err(self.undeclared(label));
        }
        Ok(())
    }

    fn undeclared(&self, label: &str) -> LaceError {
        let valid = if self.declarations.is_empty() {
            "(none)".to_string()
        } else {
            self.declarations
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        LaceError::UndeclaredMountLabel {
            label: label.to_string(),
            valid,
        }
    }

    /// Drop loaded non-override assignments whose default-derived path
    /// embeds a different project identifier. Runs once at construction,
    /// before any resolution.
    fn discard_stale_assignments(&mut self) {
        let current = self.project_id.clone();
        let lace_root = self.lace_root.clone();
        let mut stale: Vec<String> = Vec::new();

        for (label, assignment) in &self.assignments {
            if assignment.is_override {
                continue;
            }
            let path = PathBuf::from(&assignment.resolved_source);
            if let Some(embedded) = embedded_project_id(&path, &lace_root) {
                if embedded != current {
                    stale.push(label.clone());
                    let warning = format!(
                        "Discarding stale mount assignment for '{label}': {} (project is now '{current}')",
                        assignment.resolved_source
                    );
                    tracing::warn!("{warning}");
                    self.warnings.push(warning);
                }
            }
        }

        for label in stale {
            self.assignments.remove(&label);
        }
    }
}

/// The project identifier embedded in a default-derived mount path
/// (`<lace-root>/<projectId>/mounts/...`), if the path has that shape.
fn embedded_project_id(path: &Path, lace_root: &Path) -> Option<String> {
    let rel = path.strip_prefix(lace_root).ok()?;
    let mut components = rel.components();
    let project = components.next()?.as_os_str().to_string_lossy().into_owned();
    let mounts = components.next()?;
    (mounts.as_os_str() == "mounts").then_some(project)
}
