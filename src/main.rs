//! Lace CLI entry point.
//!
//! Handles command-line argument parsing, error display, and command
//! execution. The interesting logic lives in the library crate; this
//! binary only wires parsing to execution and renders failures through
//! the user-friendly error formatter.

use anyhow::Result;
use clap::Parser;
use lace_cli::cli;
use lace_cli::core::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
