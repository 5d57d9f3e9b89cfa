//! # bb-brancher CLI
//!
//! Binary entry point for the `bb-brancher` command-line tool.
//!
//! It loads the `--env` file, parses arguments with `clap`, sets up logging
//! and dispatches to the subcommand. All provisioning logic lives in the `bb_brancher` library;
//! errors returned from a subcommand are printed by `anyhow` and turn into
//! exit code 1. Usage errors exit with 2 through `clap`.

mod cli;
mod commands;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::Cli::parse_with_env_file()?;
    cli.execute()
}
