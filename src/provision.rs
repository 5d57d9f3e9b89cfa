//! # Provisioning Orchestrator
//!
//! Walks the configured branch specs in order and drives each one through
//! its state machine (see [`BranchState`]):
//!
//! 1. **Resolve** the source ref (explicit, or the repository default) to a
//!    commit id. Under dry-run a placeholder id is used and nothing is
//!    fetched.
//! 2. **Check existence** of the target branch. Under dry-run the branch is
//!    assumed missing.
//! 3. **Create** the branch if it is missing; skip creation otherwise.
//! 4. **Commit** through the backend selected by the branch's
//!    [`CommitStrategy`](crate::config::CommitStrategy), unless commits are
//!    disabled for it.
//!
//! A failure moves that branch to `Failed` and is recorded in the
//! [`RunReport`]; the next branch is still processed. Only configuration
//! problems (see [`provision`]) abort the whole run.
//!
//! Branches are processed one after another, never in parallel, so logs
//! read top to bottom and the API sees at most one request at a time.

use log::{debug, error, info};

use crate::commit::{CommitBackends, LocalEmptyCommitPush, RemoteFileCommit};
use crate::config::{BranchSpec, Config};
use crate::defaults;
use crate::effect::{Effect, ExecutionMode};
use crate::error::{Error, Result};
use crate::gateway::BranchGateway;
use crate::git::EmptyCommitPusher;
use crate::refs;
use crate::report::{
    BranchFailure, BranchOutcome, BranchResult, BranchState, CommitStatus, Phase, RunReport,
};

/// Drives branch specs through resolution, creation and commit.
pub struct Provisioner<'a> {
    gateway: &'a dyn BranchGateway,
    backends: CommitBackends<'a>,
    mode: ExecutionMode,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        gateway: &'a dyn BranchGateway,
        backends: CommitBackends<'a>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            gateway,
            backends,
            mode,
        }
    }

    /// Process every branch in order.
    pub fn run(&self, branches: &[BranchSpec]) -> RunReport {
        self.run_with(branches, |_| {})
    }

    /// Like [`Provisioner::run`], calling `on_result` as each branch finishes.
    pub fn run_with(
        &self,
        branches: &[BranchSpec],
        mut on_result: impl FnMut(&BranchResult),
    ) -> RunReport {
        let mut report = RunReport::default();
        let mut default_branch = None;

        for spec in branches {
            let result = match self.provision_branch(spec, &mut default_branch) {
                Ok(outcome) => BranchResult::Done(outcome),
                Err(failure) => {
                    error!(
                        "Branch '{}' failed during {}: {}",
                        failure.name, failure.phase, failure.error
                    );
                    BranchResult::Failed(failure)
                }
            };
            on_result(&result);
            report.push(result);
        }

        report
    }

    /// The repository default branch, fetched at most once per successful lookup.
    fn default_branch(&self, cached: &mut Option<String>) -> Result<String> {
        if self.mode.is_dry_run() {
            return Ok(defaults::SIMULATED_DEFAULT_BRANCH.to_string());
        }
        if let Some(name) = cached {
            return Ok(name.clone());
        }
        let name = self.gateway.default_branch()?;
        info!("Default branch is '{}'", name);
        *cached = Some(name.clone());
        Ok(name)
    }

    fn provision_branch(
        &self,
        spec: &BranchSpec,
        default_branch: &mut Option<String>,
    ) -> std::result::Result<BranchOutcome, BranchFailure> {
        let dry_run = self.mode.is_dry_run();
        let mut state = BranchState::Pending;
        let mut simulated = dry_run;

        let source_ref = match &spec.from {
            Some(from) => from.clone(),
            None => self
                .default_branch(default_branch)
                .map_err(|e| failed(spec, Phase::ResolveRef, state, e))?,
        };
        info!("Processing branch '{}' (from {})", spec.name, source_ref);

        let source_commit = if dry_run {
            defaults::SIMULATED_HASH.to_string()
        } else {
            refs::resolve(self.gateway, &source_ref)
                .map_err(|e| failed(spec, Phase::ResolveRef, state, e))?
                .commit
        };
        state = advance(spec, state, BranchState::RefResolved);

        let exists = if dry_run {
            false
        } else {
            self.gateway
                .branch_exists(&spec.name)
                .map_err(|e| failed(spec, Phase::CheckExistence, state, e))?
        };
        state = advance(spec, state, BranchState::ExistenceChecked);

        if exists {
            info!("Branch '{}' already exists, skipping creation", spec.name);
            state = advance(spec, state, BranchState::Skipped);
        } else {
            let effect = self
                .gateway
                .create_branch(&spec.name, &source_commit)
                .map_err(|e| failed(spec, Phase::CreateBranch, state, e))?;
            match &effect {
                Effect::Applied(created) => info!("Created branch '{}'", created.name),
                Effect::Simulated(action) => {
                    info!("Would create branch '{}' ({})", spec.name, action.name())
                }
            }
            simulated |= effect.is_simulated();
            state = advance(spec, state, BranchState::Created);
        }

        let commit = if spec.create_commit {
            let backend = self.backends.select(&spec.strategy);
            debug!("Committing on '{}' via {}", spec.name, backend.name());
            let effect = backend
                .commit(spec, &source_ref)
                .map_err(|e| failed(spec, Phase::Commit, state, e))?;
            state = advance(spec, state, BranchState::CommitDone);
            match effect {
                Effect::Applied(receipt) => CommitStatus::Created { id: receipt.id },
                Effect::Simulated(_) => {
                    simulated = true;
                    CommitStatus::Simulated
                }
            }
        } else {
            info!("Commit creation disabled for '{}'", spec.name);
            state = advance(spec, state, BranchState::CommitSkipped);
            CommitStatus::Skipped
        };
        advance(spec, state, BranchState::Done);

        Ok(BranchOutcome {
            name: spec.name.clone(),
            creation_skipped: exists,
            source_ref,
            source_commit,
            commit,
            simulated,
        })
    }
}

fn advance(spec: &BranchSpec, from: BranchState, to: BranchState) -> BranchState {
    debug!("{}: {:?} -> {:?}", spec.name, from, to);
    to
}

fn failed(spec: &BranchSpec, phase: Phase, reached: BranchState, error: Error) -> BranchFailure {
    debug!("{}: {:?} -> {:?}", spec.name, reached, BranchState::Failed);
    BranchFailure {
        name: spec.name.clone(),
        phase,
        reached,
        error,
    }
}

/// Provision every branch of `config`.
///
/// Credentials are checked before anything else; their absence outside
/// dry-run is the only error returned. Per-branch failures are in the report.
pub fn provision(
    config: &Config,
    gateway: &dyn BranchGateway,
    pusher: &dyn EmptyCommitPusher,
    on_result: impl FnMut(&BranchResult),
) -> Result<RunReport> {
    config.require_credentials()?;

    let remote = RemoteFileCommit::new(gateway);
    let local = LocalEmptyCommitPush::new(pusher);
    let provisioner = Provisioner::new(
        gateway,
        CommitBackends {
            remote: &remote,
            local: &local,
        },
        config.mode,
    );
    Ok(provisioner.run_with(&config.branches, on_result))
}
