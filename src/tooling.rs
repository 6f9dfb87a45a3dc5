//! Tooling
//!
//! Operator CLI and the text renderers it uses.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands, ValidationCommands};
