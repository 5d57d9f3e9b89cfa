//! The local empty-commit fallback against real repositories.
//!
//! Every test builds a bare "remote" seeded with one commit on `main` inside
//! a temporary directory and talks to it over a `file://` URL, so the shallow
//! clone behaves as it would against a hosted remote.

use assert_fs::TempDir;
use bb_brancher::effect::ExecutionMode;
use bb_brancher::error::Error;
use bb_brancher::git::{EmptyCommitPusher, EmptyCommitRequest, LocalCommitFallback};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare remote with `main` (one commit) and optionally extra branches.
struct Remote {
    _root: TempDir,
    bare: PathBuf,
}

impl Remote {
    fn new(extra_branches: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        let bare = root.path().join("widgets.git");
        let seed = root.path().join("seed");
        std::fs::create_dir_all(&bare).unwrap();
        std::fs::create_dir_all(&seed).unwrap();

        git(&bare, &["init", "--bare", "--quiet"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        git(&seed, &["init", "--quiet"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(seed.join("README.md"), "# widgets\n").unwrap();
        git(&seed, &["add", "README.md"]);
        git(&seed, &["commit", "--quiet", "-m", "Initial"]);
        git(&seed, &["remote", "add", "origin", bare.to_str().unwrap()]);
        git(&seed, &["push", "--quiet", "origin", "main"]);

        for branch in extra_branches {
            git(&seed, &["checkout", "--quiet", "-b", branch, "main"]);
            git(
                &seed,
                &["commit", "--quiet", "--allow-empty", "-m", &format!("Work on {}", branch)],
            );
            git(&seed, &["push", "--quiet", "origin", branch]);
        }

        Self { _root: root, bare }
    }

    fn url(&self) -> String {
        url::Url::from_directory_path(&self.bare)
            .unwrap()
            .as_str()
            .trim_end_matches('/')
            .to_string()
    }

    fn rev(&self, rev: &str) -> String {
        git(&self.bare, &["rev-parse", rev])
    }

    fn message(&self, rev: &str) -> String {
        git(&self.bare, &["log", "-1", "--format=%s", rev])
    }
}

fn request(branch: &str, from: Option<&str>, force_push: bool) -> EmptyCommitRequest {
    EmptyCommitRequest {
        branch: branch.to_string(),
        from_ref: from.map(str::to_string),
        message: format!("Empty commit on {}", branch),
        force_push,
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn test_new_branch_starts_at_source_ref() {
    let remote = Remote::new(&[]);
    let workspaces = TempDir::new().unwrap();
    let fallback = LocalCommitFallback::new(remote.url(), None, ExecutionMode::Live)
        .with_workspace_root(workspaces.path());

    let receipt = fallback
        .push_empty_commit(&request("sandbox", Some("main"), false))
        .unwrap()
        .applied()
        .unwrap();

    let tip = remote.rev("refs/heads/sandbox");
    assert_eq!(receipt.id.as_deref(), Some(tip.as_str()));
    assert_eq!(remote.rev("refs/heads/sandbox^"), remote.rev("refs/heads/main"));
    assert_eq!(remote.message("refs/heads/sandbox"), "Empty commit on sandbox");
    assert!(is_empty_dir(workspaces.path()));
}

#[test]
fn test_existing_remote_branch_gets_commit_on_top() {
    let remote = Remote::new(&["develop"]);
    let before = remote.rev("refs/heads/develop");
    let fallback = LocalCommitFallback::new(remote.url(), None, ExecutionMode::Live)
        .with_timeout(Duration::from_secs(120));

    fallback
        .push_empty_commit(&request("develop", Some("main"), false))
        .unwrap();

    assert_eq!(remote.rev("refs/heads/develop^"), before);
    assert_eq!(remote.message("refs/heads/develop"), "Empty commit on develop");
}

#[test]
fn test_missing_source_ref_is_tolerated() {
    let remote = Remote::new(&[]);
    let fallback = LocalCommitFallback::new(remote.url(), None, ExecutionMode::Live);

    fallback
        .push_empty_commit(&request("orphan", Some("does-not-exist"), false))
        .unwrap();

    // Falls back to the clone's HEAD, the remote default branch.
    assert_eq!(remote.rev("refs/heads/orphan^"), remote.rev("refs/heads/main"));
}

#[test]
fn test_configured_identity_is_used() {
    let remote = Remote::new(&[]);
    let fallback = LocalCommitFallback::new(remote.url(), None, ExecutionMode::Live)
        .with_identity(Some(bb_brancher::config::CommitIdentity {
            name: "Release Bot".to_string(),
            email: "release@example.com".to_string(),
        }));

    fallback
        .push_empty_commit(&request("release-9", Some("main"), false))
        .unwrap();

    let author = git(
        &remote.bare,
        &["log", "-1", "--format=%an <%ae>", "refs/heads/release-9"],
    );
    assert_eq!(author, "Release Bot <release@example.com>");
}

#[test]
fn test_force_push_with_lease_updates_branch() {
    let remote = Remote::new(&["scratch"]);
    let fallback = LocalCommitFallback::new(remote.url(), None, ExecutionMode::Live);

    fallback
        .push_empty_commit(&request("scratch", None, true))
        .unwrap();
    let first = remote.rev("refs/heads/scratch");

    fallback
        .push_empty_commit(&request("scratch", None, true))
        .unwrap();
    assert_eq!(remote.rev("refs/heads/scratch^"), first);
}

#[test]
fn test_failed_clone_cleans_up_and_reports_step() {
    let workspaces = TempDir::new().unwrap();
    let missing = workspaces.path().join("nowhere.git");
    let remote_url = url::Url::from_file_path(&missing).unwrap().to_string();
    let root = workspaces.path().join("clones");
    std::fs::create_dir_all(&root).unwrap();

    let fallback =
        LocalCommitFallback::new(remote_url, None, ExecutionMode::Live).with_workspace_root(&root);
    let err = fallback
        .push_empty_commit(&request("sandbox", Some("main"), false))
        .unwrap_err();

    assert!(matches!(err, Error::LocalCommit { ref step, .. } if step == "clone"));
    assert!(is_empty_dir(&root));
}

#[test]
fn test_dry_run_leaves_remote_untouched() {
    let remote = Remote::new(&[]);
    let fallback = LocalCommitFallback::new(remote.url(), None, ExecutionMode::DryRun);

    let effect = fallback
        .push_empty_commit(&request("sandbox", Some("main"), true))
        .unwrap();

    assert!(effect.is_simulated());
    let branches = git(&remote.bare, &["branch", "--list"]);
    assert!(!branches.contains("sandbox"));
}
