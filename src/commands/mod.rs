//! # CLI Command Implementations
//!
//! One module per subcommand of `bb-brancher`. Each module has an `Args`
//! struct derived with `clap` and an `execute` function that builds what the
//! library needs from those arguments and prints the results.

pub mod completions;
pub mod provision;
pub mod validate;
