//! # Local Commit Fallback
//!
//! Seeds a branch with an empty commit by working in a throwaway clone:
//!
//! 1. Inject the credentials into the clone URL (only where none are present).
//! 2. Allocate a uniquely named temporary directory.
//! 3. Shallow clone (`--depth 1 --no-single-branch`).
//! 4. Check out the target branch using the strategies in [`CHECKOUT_ORDER`].
//! 5. Set a committer identity local to the clone.
//! 6. `git commit --allow-empty`.
//! 7. `git push -u origin <branch>`, optionally `--force-with-lease`.
//!
//! The temporary directory is a [`tempfile::TempDir`] owned by the call, so
//! it is removed on every exit path, including errors. Under dry-run nothing
//! is allocated and a simulated descriptor is returned instead.
//!
//! This uses the system `git` command. Every invocation runs with a deadline
//! and `GIT_TERMINAL_PROMPT=0`, so a missing credential fails instead of
//! waiting for input.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use url::Url;

use crate::config::{CommitIdentity, Credentials};
use crate::defaults;
use crate::effect::{Effect, ExecutionMode, SimulatedAction};
use crate::error::{Error, Result};
use crate::gateway::CommitReceipt;

/// What the local fallback is asked to do for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyCommitRequest {
    pub branch: String,
    /// Where a new branch starts; best-effort, a missing ref is tolerated.
    pub from_ref: Option<String>,
    pub message: String,
    pub force_push: bool,
}

/// Produces an empty commit on a remote branch.
pub trait EmptyCommitPusher {
    fn push_empty_commit(&self, request: &EmptyCommitRequest) -> Result<Effect<CommitReceipt>>;
}

/// Ways of getting the target branch checked out, tried in [`CHECKOUT_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkout {
    /// Fetch the branch from `origin` and reset a local branch onto it.
    RemoteBranch,
    /// Move to the source ref, then switch to a local branch of that name.
    ExistingLocalBranch,
    /// Create the branch at the current HEAD.
    NewLocalBranch,
}

pub const CHECKOUT_ORDER: [Checkout; 3] = [
    Checkout::RemoteBranch,
    Checkout::ExistingLocalBranch,
    Checkout::NewLocalBranch,
];

/// Result of a step that may legitimately not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Attempt {
    Done,
    Unavailable(String),
}

/// [`EmptyCommitPusher`] backed by the system `git`.
pub struct LocalCommitFallback {
    remote_url: String,
    credentials: Option<Credentials>,
    identity: Option<CommitIdentity>,
    mode: ExecutionMode,
    workspace_root: Option<PathBuf>,
    timeout: Duration,
}

impl LocalCommitFallback {
    pub fn new(
        remote_url: impl Into<String>,
        credentials: Option<Credentials>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            remote_url: remote_url.into(),
            credentials,
            identity: None,
            mode,
            workspace_root: None,
            timeout: defaults::GIT_TIMEOUT,
        }
    }

    pub fn with_identity(mut self, identity: Option<CommitIdentity>) -> Self {
        self.identity = identity;
        self
    }

    /// Allocate temporary clones under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn committer(&self) -> CommitIdentity {
        if let Some(identity) = &self.identity {
            return identity.clone();
        }
        let name = self
            .credentials
            .as_ref()
            .map(|c| c.username.clone())
            .unwrap_or_else(|| defaults::FALLBACK_AUTHOR.to_string());
        let email = format!("{}@{}", name, defaults::AUTHOR_EMAIL_DOMAIN);
        CommitIdentity { name, email }
    }

    fn allocate_workspace(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(defaults::WORKSPACE_PREFIX);
        let dir = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| Error::LocalCommit {
            step: "workspace".to_string(),
            message: e.to_string(),
        })
    }
}

impl EmptyCommitPusher for LocalCommitFallback {
    fn push_empty_commit(&self, request: &EmptyCommitRequest) -> Result<Effect<CommitReceipt>> {
        if self.mode.is_dry_run() {
            return Ok(Effect::Simulated(SimulatedAction::CreateEmptyCommitAndPush {
                remote_url: self.remote_url.clone(),
                from_ref: request.from_ref.clone(),
                branch: request.branch.clone(),
                message: request.message.clone(),
                force_push: request.force_push,
            }));
        }

        let auth_url = authenticated_url(&self.remote_url, self.credentials.as_ref());
        let workspace = self.allocate_workspace()?;
        debug!(
            "Cloning {} into {}",
            self.remote_url,
            workspace.path().display()
        );

        let git = Git {
            dir: workspace.path(),
            timeout: self.timeout,
            secrets: secrets_of(&auth_url, self.credentials.as_ref()),
        };

        git.run(
            "clone",
            &[
                "clone",
                "--depth",
                "1",
                "--no-single-branch",
                &auth_url,
                ".",
            ],
        )?;

        let used = check_out_target(&git, request)?;
        info!("Checked out '{}' via {:?}", request.branch, used);

        let committer = self.committer();
        git.run("config", &["config", "user.name", &committer.name])?;
        git.run("config", &["config", "user.email", &committer.email])?;

        git.run(
            "commit",
            &["commit", "--allow-empty", "-m", &request.message],
        )?;
        let id = git.run("rev-parse", &["rev-parse", "HEAD"])?.trim().to_string();

        let mut push = vec!["push"];
        if request.force_push {
            push.push("--force-with-lease");
        }
        push.extend(["-u", "origin", request.branch.as_str()]);
        git.run("push", &push)?;

        info!("Pushed empty commit {} to '{}'", id, request.branch);
        Ok(Effect::Applied(CommitReceipt { id: Some(id) }))
    }
}

/// Put the clone on `request.branch`, trying each strategy in order.
fn check_out_target(git: &Git<'_>, request: &EmptyCommitRequest) -> Result<Checkout> {
    for strategy in CHECKOUT_ORDER {
        match attempt_checkout(git, strategy, request)? {
            Attempt::Done => return Ok(strategy),
            Attempt::Unavailable(reason) => {
                debug!("Checkout via {:?} not possible: {}", strategy, reason)
            }
        }
    }
    Err(Error::LocalCommit {
        step: "checkout".to_string(),
        message: format!("could not check out branch '{}'", request.branch),
    })
}

fn attempt_checkout(git: &Git<'_>, strategy: Checkout, request: &EmptyCommitRequest) -> Result<Attempt> {
    let branch = request.branch.as_str();
    match strategy {
        Checkout::RemoteBranch => {
            if let Attempt::Unavailable(reason) =
                git.attempt(&["fetch", "--depth", "1", "origin", branch])?
            {
                return Ok(Attempt::Unavailable(reason));
            }
            let tracking = format!("origin/{}", branch);
            git.attempt(&["checkout", "-B", branch, &tracking])
        }
        Checkout::ExistingLocalBranch => {
            // Also positions HEAD for NewLocalBranch.
            if let Some(from) = &request.from_ref {
                if let Attempt::Unavailable(reason) = git.attempt(&["checkout", from])? {
                    warn!("Source ref '{}' not available locally: {}", from, reason);
                }
            }
            let listed = git.run("branch", &["branch", "--list", branch])?;
            if listed.trim().is_empty() {
                return Ok(Attempt::Unavailable(format!("no local branch '{}'", branch)));
            }
            git.run("checkout", &["checkout", branch])?;
            Ok(Attempt::Done)
        }
        Checkout::NewLocalBranch => {
            git.run("checkout", &["checkout", "-b", branch])?;
            Ok(Attempt::Done)
        }
    }
}

/// Inject credentials into the userinfo of an http(s) URL.
///
/// Userinfo already present in the URL is kept. URLs that cannot carry
/// credentials (scp-style, `file://`, unparsable) are returned unchanged.
pub fn authenticated_url(remote_url: &str, credentials: Option<&Credentials>) -> String {
    let Some(credentials) = credentials else {
        return remote_url.to_string();
    };
    let Ok(mut url) = Url::parse(remote_url) else {
        return remote_url.to_string();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return remote_url.to_string();
    }
    if url.username().is_empty() && url.set_username(&credentials.username).is_err() {
        return remote_url.to_string();
    }
    if url.password().is_none() && url.set_password(Some(&credentials.app_password)).is_err() {
        return remote_url.to_string();
    }
    url.to_string()
}

/// The strings that must never show up in output: the app password as given
/// and the password exactly as it is written in `auth_url`.
pub fn secrets_of(auth_url: &str, credentials: Option<&Credentials>) -> Vec<String> {
    let mut secrets: Vec<String> = credentials
        .map(|c| c.app_password.clone())
        .into_iter()
        .chain(
            Url::parse(auth_url)
                .ok()
                .and_then(|url| url.password().map(str::to_string)),
        )
        .filter(|s| !s.is_empty())
        .collect();
    secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    secrets.dedup();
    secrets
}

/// Replace every occurrence of each secret with `***`.
pub fn redact(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |text, secret| text.replace(secret.as_str(), "***"))
}

/// `git` bound to one working directory.
struct Git<'a> {
    dir: &'a Path,
    timeout: Duration,
    secrets: Vec<String>,
}

impl Git<'_> {
    fn output(&self, args: &[&str]) -> std::io::Result<Option<Output>> {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        run_with_deadline(command, self.timeout)
    }

    fn describe(&self, args: &[&str]) -> String {
        redact(&format!("git {}", args.join(" ")), &self.secrets)
    }

    /// Run git; the inner `Err` carries stderr of a non-zero exit.
    ///
    /// Only a git that cannot be started or that times out is an outer error.
    fn exec(&self, step: &str, args: &[&str]) -> Result<std::result::Result<String, String>> {
        debug!("{}", self.describe(args));
        let output = self
            .output(args)
            .map_err(|e| Error::LocalCommit {
                step: step.to_string(),
                message: format!("failed to run git: {}", e),
            })?
            .ok_or_else(|| Error::LocalCommit {
                step: step.to_string(),
                message: format!(
                    "{} timed out after {}s",
                    self.describe(args),
                    self.timeout.as_secs()
                ),
            })?;

        if output.status.success() {
            Ok(Ok(String::from_utf8_lossy(&output.stdout).into_owned()))
        } else {
            let stderr = redact(&String::from_utf8_lossy(&output.stderr), &self.secrets);
            Ok(Err(stderr.trim().to_string()))
        }
    }

    /// Run a step that must succeed; returns stdout.
    fn run(&self, step: &str, args: &[&str]) -> Result<String> {
        self.exec(step, args)?.map_err(|stderr| Error::LocalCommit {
            step: step.to_string(),
            message: failure_message(&stderr),
        })
    }

    /// Run a step whose failure is an expected outcome.
    fn attempt(&self, args: &[&str]) -> Result<Attempt> {
        Ok(match self.exec(args[0], args)? {
            Ok(_) => Attempt::Done,
            Err(stderr) => Attempt::Unavailable(stderr),
        })
    }
}

/// Helpful text for common authentication failures.
fn failure_message(stderr: &str) -> String {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
        || stderr.contains("terminal prompts disabled")
    {
        format!(
            "Authentication failed. Make sure the username and app password \
            have write access to the repository.\nError: {}",
            stderr.trim()
        )
    } else {
        stderr.trim().to_string()
    }
}

/// Wait for `command` at most `timeout`; `Ok(None)` means it was killed.
///
/// Helpers spawned by git (such as `git-remote-https`) can keep the output
/// pipes open after git itself is gone, so the output is collected with a
/// deadline too and is cut short when they linger.
fn run_with_deadline(mut command: Command, timeout: Duration) -> std::io::Result<Option<Output>> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (sender, receiver) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        drain(Stream::Stdout, stdout, sender.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        drain(Stream::Stderr, stderr, sender.clone());
    }
    drop(sender);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(Duration::from_millis(20));
    };

    let collect_until = match status {
        Some(_) => deadline.max(Instant::now() + OUTPUT_GRACE),
        None => Instant::now() + OUTPUT_GRACE,
    };
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    loop {
        let wait = collect_until.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(wait) {
            Ok((Stream::Stdout, buffer)) => stdout = buffer,
            Ok((Stream::Stderr, buffer)) => stderr = buffer,
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                debug!("Output pipes still open after git exited; not waiting for them");
                break;
            }
        }
    }

    Ok(status.map(|status| Output {
        status,
        stdout,
        stderr,
    }))
}

/// How long to keep reading output once git has exited or been killed.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(stream: Stream, mut reader: R, sender: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        let _ = sender.send((stream, buffer));
    });
}
