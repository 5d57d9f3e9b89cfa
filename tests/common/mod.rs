//! Shared fixtures for the CLI end-to-end tests.
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_config(configs::DRY_RUN);
//! fixture.command().arg("provision").assert().success();
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Config files used across the end-to-end tests.
#[allow(dead_code)]
pub mod configs {
    /// Four branches covering every commit option, dry-run set in the file.
    pub const DRY_RUN: &str = r#"{
  "workspace": "acme",
  "repoSlug": "widgets",
  "dryRun": true,
  "branches": [
    "develop",
    { "name": "release-1", "from": "main", "commitMessage": "Start release 1" },
    { "name": "sandbox", "emptyCommit": true, "forcePush": true },
    { "name": "hotfix", "createCommit": false }
  ]
}"#;

    /// A live config without credentials.
    pub const LIVE_NO_CREDENTIALS: &str = r#"{
  "workspace": "acme",
  "repoSlug": "widgets",
  "branches": ["develop"]
}"#;

    pub const MISSING_REPO_SLUG: &str = r#"{
  "workspace": "acme",
  "branches": ["develop"]
}"#;

    pub const EMPTY_BRANCHES: &str = r#"{
  "workspace": "acme",
  "repoSlug": "widgets",
  "branches": []
}"#;

    pub const INVALID_BRANCH_NAME: &str = r#"{
  "workspace": "acme",
  "repoSlug": "widgets",
  "branches": ["ok", "not valid"]
}"#;

    pub const INVALID_JSON: &str = r#"{ "workspace": "acme", "#;

    /// YAML flavour of a small dry-run config.
    pub const DRY_RUN_YAML: &str = r#"
workspace: acme
repoSlug: widgets
dryRun: true
branches:
  - develop
  - name: sandbox
    emptyCommit: true
"#;
}

/// A temporary working directory, optionally holding a config file.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `bb.config.json` with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("bb.config.json", content)
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("bb.config.json")
    }

    /// The binary, run in the fixture directory with a clean environment for
    /// every variable the tool reads.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bb-brancher");
        cmd.current_dir(self.path())
            .env_remove("BITBUCKET_BASE_URL")
            .env_remove("BITBUCKET_USERNAME")
            .env_remove("BITBUCKET_APP_PASSWORD")
            .env_remove("DRY_RUN")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
