//! Execution mode and the results of mutating operations.
//!
//! Every component that can change remote or local state receives an
//! [`ExecutionMode`] when it is constructed. Under [`ExecutionMode::DryRun`]
//! the mutation is replaced by an [`Effect::Simulated`] value describing what
//! would have been done, and nothing leaves the process.

use serde::Serialize;

/// Whether mutations are performed or only described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Live,
    DryRun,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Live
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == ExecutionMode::DryRun
    }
}

/// A mutation that was skipped because of dry-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SimulatedAction {
    #[serde(rename_all = "camelCase")]
    CreateBranch { name: String, from: String },
    #[serde(rename_all = "camelCase")]
    CreateCommit {
        branch: String,
        message: String,
        file_path: String,
    },
    #[serde(rename_all = "camelCase")]
    CreateEmptyCommitAndPush {
        remote_url: String,
        from_ref: Option<String>,
        branch: String,
        message: String,
        force_push: bool,
    },
}

impl SimulatedAction {
    /// Short name of the action, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SimulatedAction::CreateBranch { .. } => "createBranch",
            SimulatedAction::CreateCommit { .. } => "createCommit",
            SimulatedAction::CreateEmptyCommitAndPush { .. } => "createEmptyCommitAndPush",
        }
    }
}

/// Result of a mutating operation: either it happened, or it was simulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<T> {
    Applied(T),
    Simulated(SimulatedAction),
}

impl<T> Effect<T> {
    pub fn is_simulated(&self) -> bool {
        matches!(self, Effect::Simulated(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Effect::Applied(value) => Some(value),
            Effect::Simulated(_) => None,
        }
    }
}
