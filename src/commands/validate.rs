//! # Validate Command
//!
//! Parses and validates a configuration file without touching the network,
//! then prints each branch with its source ref and the commit path it would
//! take. The API root and credentials fall back to the same environment
//! variables `provision` reads.

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use bb_brancher::config::{self, BranchSpec, CommitStrategy, Config, Overrides};
use bb_brancher::defaults;
use bb_brancher::output::{emoji, OutputConfig};

/// Check a configuration file without contacting the remote
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the configuration file (.json, .yaml or .yml)
    #[arg(short, long, value_name = "FILE", default_value = defaults::CONFIG_FILE)]
    pub config: PathBuf,

    /// Also require credentials, as a live run would
    #[arg(long)]
    pub require_credentials: bool,

    #[arg(long, value_name = "URL", env = "BITBUCKET_BASE_URL", hide = true)]
    pub base_url: Option<String>,

    #[arg(long, value_name = "NAME", env = "BITBUCKET_USERNAME", hide = true)]
    pub username: Option<String>,

    #[arg(
        long,
        value_name = "SECRET",
        env = "BITBUCKET_APP_PASSWORD",
        hide = true,
        hide_env_values = true
    )]
    pub app_password: Option<String>,
}

fn describe(spec: &BranchSpec) -> String {
    let from = spec.from.as_deref().unwrap_or("<default branch>");
    let commit = match (&spec.strategy, spec.create_commit) {
        (_, false) => "no commit".to_string(),
        (CommitStrategy::RemoteFile { path, .. }, true) => format!("remote commit of {}", path),
        (CommitStrategy::LocalEmptyPush { force_push: true }, true) => {
            "empty commit, force push".to_string()
        }
        (CommitStrategy::LocalEmptyPush { force_push: false }, true) => "empty commit".to_string(),
    };
    format!("{} <- {} ({})", spec.name, from, commit)
}

fn print_summary(out: &OutputConfig, config: &Config) {
    println!(
        "\n{} Repository: {}/{}",
        emoji(out, "📊", "[INFO]"),
        config.coordinates.workspace,
        config.coordinates.repo_slug
    );
    println!("   API: {}", config.coordinates.base_url);
    println!("   Clone URL: {}", config.remote_url);
    println!(
        "   Mode: {}",
        if config.mode.is_dry_run() {
            "dry run"
        } else {
            "live"
        }
    );
    println!("   Branches ({}):", config.branches.len());
    for spec in &config.branches {
        println!("     {}", describe(spec));
    }
}

pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating configuration: {}",
        emoji(&out, "🔍", "[SCAN]"),
        args.config.display()
    );

    let overrides = Overrides {
        base_url: args.base_url,
        username: args.username,
        app_password: args.app_password,
        ..Overrides::default()
    };
    let config = match config::from_file(&args.config, &overrides) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Configuration is invalid", emoji(&out, "❌", "[ERR]"));
            return Err(e.into());
        }
    };

    if args.require_credentials && config.credentials.is_none() {
        println!("{} No credentials configured", emoji(&out, "❌", "[ERR]"));
        bail!("Credentials are required: set username/appPassword or BITBUCKET_USERNAME/BITBUCKET_APP_PASSWORD");
    }

    print_summary(&out, &config);
    println!("\n{} Configuration is valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}
