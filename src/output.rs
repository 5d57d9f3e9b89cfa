//! # Output Configuration
//!
//! Controls how status lines look on the terminal: emoji and color when the
//! terminal supports them, bracketed plain-text markers otherwise.
//!
//! The following flags and environment variables are respected:
//! - `--color=never|always|auto`
//! - `NO_COLOR` disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` disables colors
//! - `CLICOLOR_FORCE=1` forces colors even in non-TTY
//! - `TERM=dumb` disables colors
//!
//! ```rust,ignore
//! use bb_brancher::output::{OutputConfig, emoji};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} Provisioning...", emoji(&out, "🌿", "[RUN]"));
//! ```

use std::env;

use crate::report::BranchResult;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag against the environment.
    ///
    /// `always` and `never` win outright; anything else detects support from
    /// `NO_COLOR`, `CLICOLOR`, `CLICOLOR_FORCE`, `TERM` and whether stdout is
    /// a TTY, in that order.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // Presence alone disables, even when empty.
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Human-readable status line for one finished branch.
///
/// ```text
/// [OK] release-1: created from main (abc123), commit done (def456)
/// [SKIP] hotfix: already exists, commit skipped
/// [DRY] sandbox: would be created from main, commit simulated
/// [ERR] broken: failed to resolve source ref: Reference not found: 'nope' ...
/// ```
pub fn branch_line(config: &OutputConfig, result: &BranchResult) -> String {
    match result {
        BranchResult::Done(outcome) if outcome.simulated => format!(
            "{} {}: would be created from {}, commit {}",
            emoji(config, "🧪", "[DRY]"),
            outcome.name,
            outcome.source_ref,
            outcome.commit
        ),
        BranchResult::Done(outcome) if outcome.creation_skipped => format!(
            "{} {}: already exists, commit {}",
            emoji(config, "⏭️", "[SKIP]"),
            outcome.name,
            outcome.commit
        ),
        BranchResult::Done(outcome) => format!(
            "{} {}: created from {} ({}), commit {}",
            emoji(config, "✅", "[OK]"),
            outcome.name,
            outcome.source_ref,
            short_hash(&outcome.source_commit),
            outcome.commit
        ),
        BranchResult::Failed(failure) => format!(
            "{} {}: failed to {}: {}",
            emoji(config, "❌", "[ERR]"),
            failure.name,
            failure.phase,
            failure.error
        ),
    }
}

/// First 12 characters of a commit id, the usual display length.
fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
