//! The `lace state` command: inspect or clear persisted assignments.
//!
//! State files are safe to delete; the next run re-derives fresh
//! assignments, though port numbers may then change.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::constants::{MOUNT_STATE_FILE, PORT_STATE_FILE};

/// Arguments for `lace state`.
#[derive(Args)]
pub struct StateCommand {
    #[command(subcommand)]
    action: StateAction,

    /// Workspace folder the state belongs to.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Project identifier. Defaults to the sanitized workspace folder
    /// name.
    #[arg(long)]
    project_id: Option<String>,
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the persisted port and mount assignment maps.
    Show,
    /// Delete the persisted assignments for this project.
    Clear,
}

impl StateCommand {
    /// Run the command.
    pub fn execute(self) -> Result<()> {
        let project_id = match &self.project_id {
            Some(id) => id.clone(),
            None => {
                let workspace = self.workspace.canonicalize().with_context(|| {
                    format!("Workspace not found: {}", self.workspace.display())
                })?;
                super::resolve::derive_project_id(&workspace)?
            }
        };

        let state_dir = crate::config::project_state_dir(&project_id)?;

        match self.action {
            StateAction::Show => {
                for file in [PORT_STATE_FILE, MOUNT_STATE_FILE] {
                    let path = state_dir.join(file);
                    println!("# {}", path.display());
                    if path.exists() {
                        print!(
                            "{}",
                            std::fs::read_to_string(&path)
                                .with_context(|| format!("Cannot read {}", path.display()))?
                        );
                        println!();
                    } else {
                        println!("(no state)");
                    }
                }
            }
            StateAction::Clear => {
                for file in [PORT_STATE_FILE, MOUNT_STATE_FILE] {
                    let path = state_dir.join(file);
                    if path.exists() {
                        std::fs::remove_file(&path)
                            .with_context(|| format!("Cannot remove {}", path.display()))?;
                        tracing::info!("Removed {}", path.display());
                    }
                }
            }
        }

        Ok(())
    }
}
