//! CLI argument parsing and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::commands;
use bb_brancher::defaults;

/// Bitbucket branch provisioner - create and seed a set of branches
#[derive(Parser, Debug)]
#[command(name = "bb-brancher")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Load environment variables from FILE (skipped when missing); variables
    /// already set in the environment win
    #[arg(
        long = "env",
        global = true,
        value_name = "FILE",
        default_value = defaults::ENV_FILE
    )]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the configured branches and seed them with a commit
    Provision(commands::provision::ProvisionArgs),

    /// Check a configuration file without contacting the remote
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Parse the command line, load the `--env` file and parse again, so the
    /// `env` fallbacks of the arguments see the variables from the file.
    pub fn parse_with_env_file() -> Result<Self> {
        let cli = Self::parse();
        if load_env_file(&cli.env_file)? {
            Ok(Self::parse())
        } else {
            Ok(cli)
        }
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Provision(args) => commands::provision::execute(args, &self.color),
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Returns `false` when the file does not exist.
fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to load environment file {}", path.display()))
        }
    }
}

/// Send log records to stderr, filtered by `RUST_LOG` or else `level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second init (as in tests) is harmless.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
