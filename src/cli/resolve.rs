//! The `lace resolve` command: the full resolution pipeline.
//!
//! Loads a devcontainer configuration, auto-injects feature-declared
//! templates, validates the merged declaration set, substitutes templates,
//! generates port plumbing entries, and prints the resolved tree. State is
//! persisted only after the whole pass succeeds, so a failed run never
//! corrupts previously-saved assignments.
//!
//! Feature metadata normally comes from the registry fetcher; here a
//! pre-fetched map can be supplied as a JSON file via `--metadata`. The
//! project identifier normally comes from the git-layout classifier; the
//! fallback is the sanitized workspace folder name, and `--project-id`
//! supplies the classifier's value directly.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::core::LaceError;
use crate::metadata::{FeatureMetadataMap, MountDeclaration};
use crate::mounts::MountPathResolver;
use crate::ports::PortAllocator;
use crate::template::{
    auto_inject_mount_templates, auto_inject_port_templates, generate_port_entries,
    merge_port_entries, prebaked_static_port_diagnostics, resolve_templates,
    validate_mount_namespaces, validate_mount_target_conflicts,
};

/// Arguments for `lace resolve`.
#[derive(Args)]
pub struct ResolveCommand {
    /// Workspace folder containing the devcontainer configuration.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Path to the devcontainer configuration. Defaults to
    /// `.devcontainer/devcontainer.json` or `devcontainer.json` under the
    /// workspace.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with pre-fetched feature metadata
    /// (`feature reference → metadata | null`).
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Project identifier (repository identity). Defaults to the
    /// sanitized workspace folder name.
    #[arg(long)]
    project_id: Option<String>,

    /// Write the resolved configuration to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Resolve ports only; mount templates pass through as literal text.
    #[arg(long)]
    ports_only: bool,
}

impl ResolveCommand {
    /// Run the pipeline.
    pub fn execute(self) -> Result<()> {
        let workspace = self
            .workspace
            .canonicalize()
            .with_context(|| format!("Workspace not found: {}", self.workspace.display()))?;
        let project_id = match &self.project_id {
            Some(id) => id.clone(),
            None => derive_project_id(&workspace)?,
        };
        tracing::debug!("Using project id '{project_id}'");

        let config_path = self.find_config(&workspace)?;
        let mut config: Value = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .with_context(|| format!("Cannot read {}", config_path.display()))?,
        )
        .with_context(|| format!("Invalid JSON in {}", config_path.display()))?;

        let metadata = self.load_metadata()?;
        let settings = Settings::load()?;

        // Injection before validation: feature-declared labels are part of
        // the declaration set being validated.
        let injected_ports = auto_inject_port_templates(&mut config, &metadata)?;
        let project_declarations = project_mount_declarations(&config)?;
        let injection = auto_inject_mount_templates(&mut config, &project_declarations, &metadata)?;

        let feature_ids = crate::features::build_feature_id_map(&config)?;
        let short_ids: Vec<String> = feature_ids.keys().cloned().collect();
        validate_mount_namespaces(&injection.declarations, &short_ids)?;
        validate_mount_target_conflicts(&injection.declarations)?;

        let mut allocator = PortAllocator::new(&project_id)?;
        let mut mounts = if self.ports_only {
            None
        } else {
            Some(MountPathResolver::new(
                &workspace,
                &project_id,
                settings,
                injection.declarations.clone(),
            )?)
        };

        let mut out = resolve_templates(&config, &mut allocator, mounts.as_mut())?;

        let port_metadata = crate::template::entries::collect_port_metadata(&config, &metadata);
        let entries = generate_port_entries(&out.config, &out.allocations, &port_metadata);
        merge_port_entries(&mut out.config, &entries);

        out.warnings
            .extend(prebaked_static_port_diagnostics(&config, &metadata, &injected_ports));

        // Persist only now that the whole pass succeeded.
        allocator.save()?;
        if let Some(mounts) = &mounts {
            mounts.save()?;
        }

        for allocation in &out.allocations {
            tracing::info!("port {} -> {}", allocation.label, allocation.port);
        }
        for assignment in &out.mount_assignments {
            tracing::info!(
                "mount {} -> {}{}",
                assignment.label,
                assignment.resolved_source,
                if assignment.is_override { " (override)" } else { "" }
            );
        }

        let rendered = serde_json::to_string_pretty(&out.config)
            .with_context(|| "Failed to serialize resolved configuration")?;
        match &self.output {
            Some(path) => crate::utils::fs::atomic_write_string(path, &rendered)?,
            None => println!("{rendered}"),
        }

        Ok(())
    }

    fn find_config(&self, workspace: &Path) -> Result<PathBuf> {
        if let Some(explicit) = &self.config {
            return Ok(explicit.clone());
        }
        for candidate in [
            workspace.join(".devcontainer/devcontainer.json"),
            workspace.join("devcontainer.json"),
        ] {
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(LaceError::ConfigError {
            message: format!(
                "No devcontainer.json found under {} (looked in .devcontainer/ and the root)",
                workspace.display()
            ),
        }
        .into())
    }

    fn load_metadata(&self) -> Result<FeatureMetadataMap> {
        let Some(path) = &self.metadata else {
            return Ok(FeatureMetadataMap::new());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read metadata file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid metadata JSON in {}", path.display()))
    }
}

/// Project-level mount declarations from `customizations.lace.mounts`,
/// keyed by full label.
fn project_mount_declarations(config: &Value) -> Result<BTreeMap<String, MountDeclaration>> {
    let Some(raw) = config.pointer("/customizations/lace/mounts") else {
        return Ok(BTreeMap::new());
    };
    serde_json::from_value(raw.clone())
        .with_context(|| "Invalid mount declarations under customizations.lace.mounts")
}

/// Sanitized fallback project identifier: the workspace folder name,
/// lowercased with runs of non-alphanumerics collapsed to hyphens.
pub(super) fn derive_project_id(workspace: &Path) -> Result<String> {
    let name = workspace
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LaceError::ConfigError {
            message: format!(
                "Cannot derive a project id from workspace path: {}",
                workspace.display()
            ),
        })?;

    let mut id = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    let id = id.trim_matches('-').to_string();
    if id.is_empty() {
        return Err(LaceError::ConfigError {
            message: format!("Workspace folder name '{name}' sanitizes to an empty project id"),
        }
        .into());
    }
    Ok(id)
}
