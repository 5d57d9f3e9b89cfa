//! Default values for bb-brancher configuration.
//!
//! This module provides centralized default values used across the library
//! and the commands, ensuring consistency and avoiding duplication.

use std::time::Duration;

/// API root used when neither the config file nor `BITBUCKET_BASE_URL` set one.
pub const BASE_URL: &str = "https://api.bitbucket.org/2.0";

/// Host used to derive the clone URL when `remoteUrl` is not configured.
pub const CLONE_HOST: &str = "https://bitbucket.org";

/// Config file looked up by the CLI when `--config` is not given.
pub const CONFIG_FILE: &str = "bb.config.json";

/// Environment file loaded by the CLI when `--env` is not given.
pub const ENV_FILE: &str = ".env";

pub const COMMIT_FILE_PATH: &str = "README.md";
pub const COMMIT_CONTENT: &str = "Created by automation.";

/// Used when the repository metadata does not name a main branch.
pub const FALLBACK_DEFAULT_BRANCH: &str = "master";

/// Default source ref reported under dry-run, where no metadata is fetched.
pub const SIMULATED_DEFAULT_BRANCH: &str = "main";

/// Placeholder source commit under dry-run.
pub const SIMULATED_HASH: &str = "SIMULATED_HASH";

/// Per-request timeout of the API client.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for each git command of the local fallback.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Prefix of the throwaway clone directories.
pub const WORKSPACE_PREFIX: &str = "bb-brancher-";

/// Identity used for empty commits when neither an author nor a username is known.
pub const FALLBACK_AUTHOR: &str = "automation";

/// Domain of the synthetic committer e-mail address.
pub const AUTHOR_EMAIL_DOMAIN: &str = "users.noreply.local";

/// Message of a remote file commit when the branch spec does not set one.
pub fn commit_message(branch: &str) -> String {
    format!("Initial commit on {}", branch)
}

/// Message of a local empty commit when the branch spec does not set one.
pub fn empty_commit_message(branch: &str) -> String {
    format!("Empty commit on {}", branch)
}

/// Clone URL derived from the repository coordinates.
pub fn clone_url(workspace: &str, repo_slug: &str) -> String {
    format!("{}/{}/{}.git", CLONE_HOST, workspace, repo_slug)
}
