//! # Bitbucket Branch Provisioner
//!
//! This library creates a fixed set of branches in a hosted Bitbucket
//! repository and optionally seeds each new branch with a commit. It powers
//! the `bb-brancher` command-line tool but can be embedded anywhere a
//! [`config::Config`] can be built.
//!
//! ## Quick Example
//!
//! ```
//! use bb_brancher::config::{self, Overrides};
//!
//! let raw = config::parse_json(r#"{
//!     "workspace": "acme",
//!     "repoSlug": "widgets",
//!     "dryRun": true,
//!     "branches": ["develop", { "name": "release-1", "from": "main" }]
//! }"#).unwrap();
//! let config = config::Config::from_raw(raw, &Overrides::default()).unwrap();
//!
//! assert!(config.mode.is_dry_run());
//! assert_eq!(config.branches.len(), 2);
//! assert_eq!(config.branches[1].from.as_deref(), Some("main"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The `bb.config.json` schema, its defaults
//!   and the environment overrides, validated up front.
//! - **Execution mode (`effect`)**: Live or dry-run. Every mutation returns an
//!   [`effect::Effect`] that is either applied or a description of what would
//!   have happened.
//! - **Gateway (`gateway`)**: The REST client behind the [`gateway::BranchGateway`]
//!   trait: ref lookups, branch creation and single-file commits.
//! - **Ref resolution (`refs`)**: Branch first, then tag.
//! - **Commit backends (`commit`, `git`)**: A remote single-file commit, or an
//!   empty commit made in a temporary clone and pushed with the system `git`.
//! - **Orchestration (`provision`, `report`)**: One branch at a time, each
//!   through its own state machine, with per-branch outcomes collected into a
//!   [`report::RunReport`].
//!
//! ## Execution Flow
//!
//! 1.  **Configure**: Parse the file, apply overrides, reject invalid names.
//! 2.  **Resolve**: Find the commit the source ref points at.
//! 3.  **Create**: Create the branch unless it already exists.
//! 4.  **Commit**: Seed the branch through the selected backend.
//! 5.  **Report**: Print one status line per branch and a summary.

pub mod commit;
pub mod config;
pub mod defaults;
pub mod effect;
pub mod error;
pub mod gateway;
pub mod git;
pub mod output;
pub mod provision;
pub mod refs;
pub mod report;
