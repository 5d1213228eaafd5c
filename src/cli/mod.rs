//! Command-line interface for lace.
//!
//! Each command is implemented as a separate module with its own argument
//! structure and execution logic:
//!
//! - `resolve` - run the template resolution pipeline over a devcontainer
//!   configuration and print the resolved tree
//! - `state` - inspect or clear the persisted per-project assignments
//!
//! # Global Options
//!
//! - `--verbose` - enable debug output (equivalent to `RUST_LOG=debug`)
//! - `--quiet` - suppress everything except errors

mod resolve;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Devcontainer templating and resource allocation.
#[derive(Parser)]
#[command(name = "lace", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve port and mount templates in a devcontainer configuration.
    Resolve(resolve::ResolveCommand),
    /// Inspect or clear persisted port and mount assignments.
    State(state::StateCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub fn execute(self) -> Result<()> {
        self.init_logging();
        match self.command {
            Commands::Resolve(cmd) => cmd.execute(),
            Commands::State(cmd) => cmd.execute(),
        }
    }

    fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let default_level = if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    }
}
