//! # Configuration Schema and Parsing
//!
//! This module defines the `bb.config.json` file format and turns it into a
//! validated [`Config`] that the rest of the library consumes read-only.
//!
//! ## Format
//!
//! ```json
//! {
//!   "workspace": "acme",
//!   "repoSlug": "widgets",
//!   "branches": [
//!     "develop",
//!     { "name": "release-1", "from": "main", "commitMessage": "Start release 1" },
//!     { "name": "sandbox", "emptyCommit": true, "forcePush": true },
//!     { "name": "hotfix", "createCommit": false }
//!   ]
//! }
//! ```
//!
//! A branch entry is either a bare name or an object. Files ending in `.yaml`
//! or `.yml` are read as YAML with the same keys.
//!
//! ## Validation
//!
//! Parsing happens in two steps: the raw file is deserialized into
//! [`RawConfig`], then [`Config::from_raw`] applies defaults and the
//! environment [`Overrides`] and rejects anything incomplete. Every check
//! runs before the first network call; failures are reported as
//! [`Error::Config`].

use crate::defaults;
use crate::effect::ExecutionMode;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

/// The config file as written by the user, before defaults are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    pub workspace: Option<String>,
    pub repo_slug: Option<String>,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
    /// Clone URL for the local empty-commit path.
    pub remote_url: Option<String>,
    pub default_commit_file_path: Option<String>,
    pub default_commit_content: Option<String>,
    pub default_create_commit: Option<bool>,
    pub dry_run: Option<bool>,
    pub fail_on_branch_error: Option<bool>,
    pub commit_author: Option<CommitIdentity>,
    pub branches: Option<Vec<RawBranch>>,
}

/// One entry of the `branches` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBranch {
    Name(String),
    Detailed(RawBranchSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBranchSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub from: Option<String>,
    pub create_commit: Option<bool>,
    pub commit_message: Option<String>,
    pub file_path: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub empty_commit: bool,
    #[serde(default)]
    pub force_push: bool,
}

/// Values taken from the command line or the environment.
///
/// Each one is only used when the config file leaves the matching key unset.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
    /// `--dry-run` on the command line; always wins.
    pub dry_run: bool,
    /// `DRY_RUN` from the environment; used when the file has no `dryRun`.
    pub dry_run_env: bool,
}

/// Where the repository lives. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub base_url: Url,
    pub workspace: String,
    pub repo_slug: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub app_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("app_password", &"***")
            .finish()
    }
}

/// Committer identity for the local empty-commit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// How a branch gets its seed commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Single-file commit through the API's source endpoint.
    RemoteFile { path: String, content: String },
    /// Empty commit made in a throwaway clone and pushed.
    LocalEmptyPush { force_push: bool },
}

/// One configured target branch. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSpec {
    pub name: String,
    /// Source ref; the repository's default branch when `None`.
    pub from: Option<String>,
    pub create_commit: bool,
    pub commit_message: Option<String>,
    pub strategy: CommitStrategy,
}

impl BranchSpec {
    /// A branch created from the default branch with a remote README commit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: None,
            create_commit: true,
            commit_message: None,
            strategy: CommitStrategy::RemoteFile {
                path: defaults::COMMIT_FILE_PATH.to_string(),
                content: defaults::COMMIT_CONTENT.to_string(),
            },
        }
    }

    pub fn from_ref(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn without_commit(mut self) -> Self {
        self.create_commit = false;
        self
    }

    pub fn with_strategy(mut self, strategy: CommitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The commit message, falling back to the default for the strategy.
    pub fn message(&self) -> String {
        match (&self.commit_message, &self.strategy) {
            (Some(message), _) => message.clone(),
            (None, CommitStrategy::RemoteFile { .. }) => defaults::commit_message(&self.name),
            (None, CommitStrategy::LocalEmptyPush { .. }) => {
                defaults::empty_commit_message(&self.name)
            }
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub coordinates: RepositoryCoordinates,
    pub credentials: Option<Credentials>,
    pub remote_url: String,
    pub commit_identity: Option<CommitIdentity>,
    pub mode: ExecutionMode,
    pub fail_on_branch_error: bool,
    pub branches: Vec<BranchSpec>,
}

impl Config {
    /// Apply defaults and overrides to a raw config and validate the result.
    pub fn from_raw(raw: RawConfig, overrides: &Overrides) -> Result<Self> {
        let workspace = required(raw.workspace, "workspace")?;
        let repo_slug = required(raw.repo_slug, "repoSlug")?;

        let raw_branches = raw.branches.unwrap_or_default();
        if raw_branches.is_empty() {
            return Err(Error::Config {
                message: "'branches' must be a non-empty list".to_string(),
                hint: Some("Add at least one branch name to 'branches'".to_string()),
            });
        }

        let base_url = raw
            .base_url
            .filter(|s| !s.is_empty())
            .or_else(|| overrides.base_url.clone())
            .unwrap_or_else(|| defaults::BASE_URL.to_string());
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::config(format!("Invalid baseUrl '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("Invalid baseUrl '{}': not a hierarchical URL", base_url),
                hint: Some("Use an http(s) API root such as https://api.bitbucket.org/2.0".to_string()),
            });
        }

        let username = raw
            .username
            .filter(|s| !s.is_empty())
            .or_else(|| overrides.username.clone());
        let app_password = raw
            .app_password
            .filter(|s| !s.is_empty())
            .or_else(|| overrides.app_password.clone());
        let credentials = match (username, app_password) {
            (Some(username), Some(app_password)) => Some(Credentials {
                username,
                app_password,
            }),
            _ => None,
        };

        let default_path = raw
            .default_commit_file_path
            .unwrap_or_else(|| defaults::COMMIT_FILE_PATH.to_string());
        let default_content = raw
            .default_commit_content
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| defaults::COMMIT_CONTENT.to_string());
        let default_create_commit = raw.default_create_commit.unwrap_or(true);

        let branches = raw_branches
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                branch_from_raw(raw, index, &default_path, &default_content, default_create_commit)
            })
            .collect::<Result<Vec<_>>>()?;

        let remote_url = raw
            .remote_url
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| defaults::clone_url(&workspace, &repo_slug));

        let dry_run = overrides.dry_run || raw.dry_run.unwrap_or(overrides.dry_run_env);

        Ok(Self {
            coordinates: RepositoryCoordinates {
                base_url,
                workspace,
                repo_slug,
            },
            credentials,
            remote_url,
            commit_identity: raw.commit_author,
            mode: ExecutionMode::from_dry_run(dry_run),
            fail_on_branch_error: raw.fail_on_branch_error.unwrap_or(false),
            branches,
        })
    }

    /// Credentials for a live run.
    ///
    /// Absent credentials are only legal under dry-run.
    pub fn require_credentials(&self) -> Result<Option<&Credentials>> {
        match (&self.credentials, self.mode) {
            (Some(credentials), _) => Ok(Some(credentials)),
            (None, ExecutionMode::DryRun) => Ok(None),
            (None, ExecutionMode::Live) => Err(Error::Config {
                message: "Missing credentials: username and app password are required".to_string(),
                hint: Some(
                    "Set BITBUCKET_USERNAME/BITBUCKET_APP_PASSWORD, pass them in the config file, or use --dry-run"
                        .to_string(),
                ),
            }),
        }
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::config(format!("Missing configuration key: {}", key)))
}

fn branch_from_raw(
    raw: RawBranch,
    index: usize,
    default_path: &str,
    default_content: &str,
    default_create_commit: bool,
) -> Result<BranchSpec> {
    let spec = match raw {
        RawBranch::Name(name) => RawBranchSpec {
            name: Some(name),
            ..RawBranchSpec::default()
        },
        RawBranch::Detailed(spec) => spec,
    };

    let name = spec.name.unwrap_or_default();
    validate_branch_name(&name)
        .map_err(|message| Error::config(format!("branches[{}]: {}", index, message)))?;

    let strategy = if spec.empty_commit {
        CommitStrategy::LocalEmptyPush {
            force_push: spec.force_push,
        }
    } else {
        CommitStrategy::RemoteFile {
            path: spec
                .file_path
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| default_path.to_string()),
            content: spec
                .content
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| default_content.to_string()),
        }
    };

    Ok(BranchSpec {
        name,
        from: spec.from.filter(|f| !f.is_empty()),
        create_commit: spec.create_commit.unwrap_or(default_create_commit),
        commit_message: spec.commit_message.filter(|m| !m.is_empty()),
        strategy,
    })
}

fn forbidden_ref_sequences() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[\x00-\x20\x7f~^:?*\[\\]|\.\.|@\{|//").expect("static pattern is valid")
    })
}

/// Check a branch name against the rules of `git check-ref-format --branch`.
pub fn validate_branch_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("branch name is required".to_string());
    }
    if name == "@" {
        return Err("'@' is not a valid branch name".to_string());
    }
    if name.starts_with('-') || name.starts_with('/') || name.starts_with('.') {
        return Err(format!("'{}' must not start with '-', '/' or '.'", name));
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return Err(format!("'{}' must not end with '/', '.' or '.lock'", name));
    }
    if name.split('/').any(|component| component.starts_with('.')) {
        return Err(format!("'{}' has a path component starting with '.'", name));
    }
    if let Some(found) = forbidden_ref_sequences().find(name) {
        return Err(format!(
            "'{}' contains the forbidden sequence {:?}",
            name,
            found.as_str()
        ));
    }
    Ok(())
}

/// Parse a JSON config string.
pub fn parse_json(content: &str) -> Result<RawConfig> {
    Ok(serde_json::from_str(content)?)
}

/// Parse a YAML config string.
pub fn parse_yaml(content: &str) -> Result<RawConfig> {
    Ok(serde_yaml::from_str(content)?)
}

/// Read a config file, picking the format from its extension.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<RawConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::Config {
            message: format!("Configuration file not found: {}", path.display()),
            hint: Some("Pass --config <PATH> or create bb.config.json".to_string()),
        });
    }
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => parse_yaml(&content),
        _ => parse_json(&content),
    }
}

/// Read, default and validate a config file in one go.
pub fn from_file<P: AsRef<Path>>(path: P, overrides: &Overrides) -> Result<Config> {
    Config::from_raw(read_file(path)?, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: &str) -> Result<Config> {
        Config::from_raw(parse_json(json).unwrap(), &Overrides::default())
    }

    #[test]
    fn test_parse_minimal_config_with_defaults() {
        let config = load(r#"{"workspace": "acme", "repoSlug": "widgets", "branches": ["develop"]}"#)
            .unwrap();

        assert_eq!(config.coordinates.workspace, "acme");
        assert_eq!(config.coordinates.repo_slug, "widgets");
        assert_eq!(
            config.coordinates.base_url.as_str(),
            "https://api.bitbucket.org/2.0"
        );
        assert_eq!(config.remote_url, "https://bitbucket.org/acme/widgets.git");
        assert_eq!(config.mode, ExecutionMode::Live);
        assert!(!config.fail_on_branch_error);

        assert_eq!(config.branches.len(), 1);
        let branch = &config.branches[0];
        assert_eq!(branch.name, "develop");
        assert_eq!(branch.from, None);
        assert!(branch.create_commit);
        assert_eq!(
            branch.strategy,
            CommitStrategy::RemoteFile {
                path: "README.md".to_string(),
                content: "Created by automation.".to_string(),
            }
        );
        assert_eq!(branch.message(), "Initial commit on develop");
    }

    #[test]
    fn test_parse_detailed_branches() {
        let config = load(
            r#"{
                "workspace": "acme",
                "repoSlug": "widgets",
                "defaultCommitFilePath": "NOTES.md",
                "defaultCreateCommit": false,
                "branches": [
                    "plain",
                    {"name": "release-1", "from": "main", "createCommit": true, "commitMessage": "Start"},
                    {"name": "sandbox", "emptyCommit": true, "forcePush": true, "createCommit": true},
                    {"name": "docs", "createCommit": true, "filePath": "docs/index.md", "content": "hi"}
                ]
            }"#,
        )
        .unwrap();

        assert!(!config.branches[0].create_commit);

        let release = &config.branches[1];
        assert_eq!(release.from.as_deref(), Some("main"));
        assert!(release.create_commit);
        assert_eq!(release.message(), "Start");
        assert_eq!(
            release.strategy,
            CommitStrategy::RemoteFile {
                path: "NOTES.md".to_string(),
                content: "Created by automation.".to_string(),
            }
        );

        let sandbox = &config.branches[2];
        assert_eq!(
            sandbox.strategy,
            CommitStrategy::LocalEmptyPush { force_push: true }
        );
        assert_eq!(sandbox.message(), "Empty commit on sandbox");

        assert_eq!(
            config.branches[3].strategy,
            CommitStrategy::RemoteFile {
                path: "docs/index.md".to_string(),
                content: "hi".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_required_keys() {
        let err = load(r#"{"repoSlug": "widgets", "branches": ["a"]}"#).unwrap_err();
        assert!(err.to_string().contains("workspace"));

        let err = load(r#"{"workspace": "acme", "branches": ["a"]}"#).unwrap_err();
        assert!(err.to_string().contains("repoSlug"));

        let err = load(r#"{"workspace": "acme", "repoSlug": "widgets"}"#).unwrap_err();
        assert!(err.to_string().contains("non-empty"));

        let err = load(r#"{"workspace": "acme", "repoSlug": "widgets", "branches": []}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_branch_without_name_is_rejected() {
        let err = load(r#"{"workspace": "acme", "repoSlug": "widgets", "branches": [{"from": "main"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("branches[0]"));
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_duplicate_branch_names_are_kept() {
        let config =
            load(r#"{"workspace": "acme", "repoSlug": "widgets", "branches": ["a", "a"]}"#).unwrap();
        assert_eq!(config.branches.len(), 2);
    }

    #[test]
    fn test_invalid_base_url() {
        let err = load(
            r#"{"workspace": "acme", "repoSlug": "widgets", "baseUrl": "not a url", "branches": ["a"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid baseUrl"));
    }

    #[test]
    fn test_base_url_without_path_segments_is_rejected() {
        for base in ["mailto:x", "data:text/plain,hi"] {
            let err = load(&format!(
                r#"{{"workspace": "acme", "repoSlug": "widgets", "baseUrl": "{}", "branches": ["a"]}}"#,
                base
            ))
            .unwrap_err();
            assert!(
                matches!(err, Error::Config { ref message, .. } if message.contains("not a hierarchical URL")),
                "{}: {}",
                base,
                err
            );
        }
    }

    #[test]
    fn test_overrides_fill_missing_keys_only() {
        let raw = parse_json(
            r#"{"workspace": "acme", "repoSlug": "widgets", "username": "file-user", "branches": ["a"]}"#,
        )
        .unwrap();
        let overrides = Overrides {
            base_url: Some("https://bitbucket.example.com/rest/2.0/".to_string()),
            username: Some("env-user".to_string()),
            app_password: Some("env-secret".to_string()),
            ..Overrides::default()
        };
        let config = Config::from_raw(raw, &overrides).unwrap();

        assert_eq!(
            config.coordinates.base_url.as_str(),
            "https://bitbucket.example.com/rest/2.0"
        );
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.username, "file-user");
        assert_eq!(credentials.app_password, "env-secret");
    }

    #[test]
    fn test_dry_run_precedence() {
        let raw = |dry: &str| {
            parse_json(&format!(
                r#"{{"workspace": "a", "repoSlug": "b", "branches": ["x"]{}}}"#,
                dry
            ))
            .unwrap()
        };

        let env_only = Overrides {
            dry_run_env: true,
            ..Overrides::default()
        };
        assert!(Config::from_raw(raw(""), &env_only).unwrap().mode.is_dry_run());
        assert!(!Config::from_raw(raw(r#", "dryRun": false"#), &env_only)
            .unwrap()
            .mode
            .is_dry_run());

        let cli = Overrides {
            dry_run: true,
            ..Overrides::default()
        };
        assert!(Config::from_raw(raw(r#", "dryRun": false"#), &cli)
            .unwrap()
            .mode
            .is_dry_run());
    }

    #[test]
    fn test_require_credentials() {
        let mut config =
            load(r#"{"workspace": "acme", "repoSlug": "widgets", "branches": ["a"]}"#).unwrap();
        let err = config.require_credentials().unwrap_err();
        assert!(err.is_fatal_for_run());
        assert!(err.to_string().contains("hint:"));

        config.mode = ExecutionMode::DryRun;
        assert!(config.require_credentials().unwrap().is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "bot".to_string(),
            app_password: "s3cret".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("bot"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_validate_branch_name() {
        for ok in ["main", "release/1.0", "feature/ABC-12_x", "v1.2.3"] {
            assert!(validate_branch_name(ok).is_ok(), "{} should be valid", ok);
        }
        for bad in [
            "",
            "-x",
            "a..b",
            "has space",
            "ends/",
            "x.lock",
            "a:b",
            "what?",
            "a@{b",
            "a//b",
            "feature/.hidden",
            "@",
        ] {
            assert!(validate_branch_name(bad).is_err(), "{} should be invalid", bad);
        }
    }

    #[test]
    fn test_parse_yaml_config() {
        let raw = parse_yaml(
            r#"
workspace: acme
repoSlug: widgets
failOnBranchError: true
commitAuthor:
  name: Release Bot
  email: bot@example.com
branches:
  - develop
  - name: sandbox
    emptyCommit: true
"#,
        )
        .unwrap();
        let config = Config::from_raw(raw, &Overrides::default()).unwrap();
        assert!(config.fail_on_branch_error);
        assert_eq!(config.commit_identity.unwrap().name, "Release Bot");
        assert_eq!(config.branches.len(), 2);
    }

    #[test]
    fn test_read_file_missing() {
        let err = read_file("/nonexistent/bb.config.json").unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }
}
