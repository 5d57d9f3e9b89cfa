//! # Provision Command
//!
//! Loads the config, builds the HTTP gateway and the local git fallback, and
//! runs the orchestrator. One status line is printed per branch as it
//! finishes, followed by a summary.
//!
//! A branch that fails does not change the exit code unless `--strict` is
//! given or the config sets `failOnBranchError`.

use anyhow::{bail, Result};
use clap::Args;
use std::env;
use std::path::PathBuf;

use bb_brancher::config::{self, Overrides};
use bb_brancher::defaults;
use bb_brancher::gateway::{http_client, BitbucketGateway};
use bb_brancher::git::LocalCommitFallback;
use bb_brancher::output::{branch_line, emoji, OutputConfig};
use bb_brancher::provision::provision;

/// Create the configured branches and seed them with a commit
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Path to the configuration file (.json, .yaml or .yml)
    #[arg(short, long, value_name = "FILE", default_value = defaults::CONFIG_FILE)]
    pub config: PathBuf,

    /// Simulate every mutation; no request or git command changes anything.
    ///
    /// Also enabled by `DRY_RUN=1` or `DRY_RUN=true` when the config file
    /// does not set `dryRun`.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with an error if any branch failed
    #[arg(long)]
    pub strict: bool,

    /// API root, used when the config file has no `baseUrl`
    #[arg(long, value_name = "URL", env = "BITBUCKET_BASE_URL")]
    pub base_url: Option<String>,

    /// Account name, used when the config file has no `username`
    #[arg(long, value_name = "NAME", env = "BITBUCKET_USERNAME")]
    pub username: Option<String>,

    /// App password, used when the config file has no `appPassword`
    #[arg(
        long,
        value_name = "SECRET",
        env = "BITBUCKET_APP_PASSWORD",
        hide_env_values = true
    )]
    pub app_password: Option<String>,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

/// `DRY_RUN` counts as set for `1` or `true` (any case).
fn truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn dry_run_from_env() -> bool {
    env::var("DRY_RUN").is_ok_and(|v| truthy(&v))
}

pub fn execute(args: ProvisionArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    let overrides = Overrides {
        base_url: args.base_url,
        username: args.username,
        app_password: args.app_password,
        dry_run: args.dry_run,
        dry_run_env: dry_run_from_env(),
    };
    let config = config::from_file(&args.config, &overrides)?;

    let gateway = BitbucketGateway::new(
        http_client()?,
        config.coordinates.clone(),
        config.credentials.clone(),
        config.mode,
    );
    let pusher = LocalCommitFallback::new(
        config.remote_url.clone(),
        config.credentials.clone(),
        config.mode,
    )
    .with_identity(config.commit_identity.clone());

    if !args.quiet {
        println!(
            "{} Provisioning {} branch(es) in {}/{}{}",
            emoji(&out, "🌿", "[RUN]"),
            config.branches.len(),
            config.coordinates.workspace,
            config.coordinates.repo_slug,
            if config.mode.is_dry_run() {
                " (dry run)"
            } else {
                ""
            }
        );
    }

    let report = match provision(&config, &gateway, &pusher, |result| {
        if !args.quiet {
            println!("{}", branch_line(&out, result));
        }
    }) {
        Ok(report) => report,
        Err(e) if e.is_fatal_for_run() => bail!("Run aborted before any branch was processed: {}", e),
        Err(e) => return Err(e.into()),
    };

    let marker = if report.has_failures() {
        emoji(&out, "⚠️", "[WARN]")
    } else {
        emoji(&out, "📊", "[DONE]")
    };
    println!("{} {}", marker, report.summary());

    if report.has_failures() && (args.strict || config.fail_on_branch_error) {
        let failed: Vec<_> = report.failures().map(|f| f.name.as_str()).collect();
        bail!("Branch provisioning failed for: {}", failed.join(", "));
    }

    Ok(())
}
