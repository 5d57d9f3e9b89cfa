//! Commit backends.
//!
//! A branch is seeded either through the API ([`RemoteFileCommit`]) or
//! through a throwaway clone ([`LocalEmptyCommitPush`]). Both implement
//! [`CommitBackend`] and both return [`Effect::Simulated`] under dry-run, so
//! the orchestrator never has to know which one it is talking to.

use crate::config::{BranchSpec, CommitStrategy};
use crate::defaults;
use crate::effect::Effect;
use crate::error::Result;
use crate::gateway::{BranchGateway, CommitReceipt, FileCommit};
use crate::git::{EmptyCommitPusher, EmptyCommitRequest};

/// Seeds a branch with a commit.
pub trait CommitBackend {
    /// Short name used in logs and status lines.
    fn name(&self) -> &'static str;

    /// Commit on `spec.name`. `source_ref` is the ref the branch was created from.
    fn commit(&self, spec: &BranchSpec, source_ref: &str) -> Result<Effect<CommitReceipt>>;
}

/// Single-file commit through the gateway's source endpoint.
pub struct RemoteFileCommit<'a> {
    gateway: &'a dyn BranchGateway,
}

impl<'a> RemoteFileCommit<'a> {
    pub fn new(gateway: &'a dyn BranchGateway) -> Self {
        Self { gateway }
    }
}

impl CommitBackend for RemoteFileCommit<'_> {
    fn name(&self) -> &'static str {
        "remote file commit"
    }

    fn commit(&self, spec: &BranchSpec, _source_ref: &str) -> Result<Effect<CommitReceipt>> {
        let (path, content) = match &spec.strategy {
            CommitStrategy::RemoteFile { path, content } => (path.clone(), content.clone()),
            CommitStrategy::LocalEmptyPush { .. } => (
                defaults::COMMIT_FILE_PATH.to_string(),
                defaults::COMMIT_CONTENT.to_string(),
            ),
        };
        self.gateway.create_file_commit(&FileCommit {
            branch: spec.name.clone(),
            path,
            content,
            message: spec.message(),
        })
    }
}

/// Empty commit made in a local clone and pushed.
pub struct LocalEmptyCommitPush<'a> {
    pusher: &'a dyn EmptyCommitPusher,
}

impl<'a> LocalEmptyCommitPush<'a> {
    pub fn new(pusher: &'a dyn EmptyCommitPusher) -> Self {
        Self { pusher }
    }
}

impl CommitBackend for LocalEmptyCommitPush<'_> {
    fn name(&self) -> &'static str {
        "local empty commit"
    }

    fn commit(&self, spec: &BranchSpec, source_ref: &str) -> Result<Effect<CommitReceipt>> {
        let force_push = matches!(
            spec.strategy,
            CommitStrategy::LocalEmptyPush { force_push: true }
        );
        self.pusher.push_empty_commit(&EmptyCommitRequest {
            branch: spec.name.clone(),
            from_ref: Some(source_ref.to_string()),
            message: spec.message(),
            force_push,
        })
    }
}

/// The two backends, picked per branch by its [`CommitStrategy`].
pub struct CommitBackends<'a> {
    pub remote: &'a dyn CommitBackend,
    pub local: &'a dyn CommitBackend,
}

impl<'a> CommitBackends<'a> {
    pub fn select(&self, strategy: &CommitStrategy) -> &'a dyn CommitBackend {
        match strategy {
            CommitStrategy::RemoteFile { .. } => self.remote,
            CommitStrategy::LocalEmptyPush { .. } => self.local,
        }
    }
}
