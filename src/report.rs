//! Per-branch outcomes of a provisioning run.

use crate::error::Error;
use std::fmt;

/// Where a branch is in its provisioning.
///
/// `Pending → RefResolved → ExistenceChecked → {Skipped | Created} →
/// {CommitDone | CommitSkipped} → Done`; `Failed` can be reached from any
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Pending,
    RefResolved,
    ExistenceChecked,
    Skipped,
    Created,
    CommitDone,
    CommitSkipped,
    Done,
    Failed,
}

/// The step that was running when a branch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ResolveRef,
    CheckExistence,
    CreateBranch,
    Commit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ResolveRef => "resolve source ref",
            Phase::CheckExistence => "check existence",
            Phase::CreateBranch => "create branch",
            Phase::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    Created { id: Option<String> },
    Skipped,
    Simulated,
}

impl fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStatus::Created { id: Some(id) } => write!(f, "done ({})", id),
            CommitStatus::Created { id: None } => f.write_str("done"),
            CommitStatus::Skipped => f.write_str("skipped"),
            CommitStatus::Simulated => f.write_str("simulated"),
        }
    }
}

/// A branch that went all the way through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOutcome {
    pub name: String,
    /// The branch already existed, so creation was skipped.
    pub creation_skipped: bool,
    pub source_ref: String,
    pub source_commit: String,
    pub commit: CommitStatus,
    /// Every mutation for this branch was simulated.
    pub simulated: bool,
}

/// A branch that stopped early.
#[derive(Debug)]
pub struct BranchFailure {
    pub name: String,
    pub phase: Phase,
    /// Last state reached before the failure.
    pub reached: BranchState,
    pub error: Error,
}

#[derive(Debug)]
pub enum BranchResult {
    Done(BranchOutcome),
    Failed(BranchFailure),
}

impl BranchResult {
    pub fn name(&self) -> &str {
        match self {
            BranchResult::Done(outcome) => &outcome.name,
            BranchResult::Failed(failure) => &failure.name,
        }
    }
}

/// Ordered results of one run, in configuration order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<BranchResult>,
}

impl RunReport {
    pub fn push(&mut self, result: BranchResult) {
        self.results.push(result);
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &BranchOutcome> {
        self.results.iter().filter_map(|r| match r {
            BranchResult::Done(outcome) => Some(outcome),
            BranchResult::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchFailure> {
        self.results.iter().filter_map(|r| match r {
            BranchResult::Failed(failure) => Some(failure),
            BranchResult::Done(_) => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// One-line summary such as `3 branches: 2 done, 1 failed`.
    pub fn summary(&self) -> String {
        let failed = self.failures().count();
        let done = self.results.len() - failed;
        format!(
            "{} branch{}: {} done, {} failed",
            self.results.len(),
            if self.results.len() == 1 { "" } else { "es" },
            done,
            failed
        )
    }
}
