//! Command trait definition for CLI commands.
//!
//! Subcommands are dispatched through [`enum_dispatch`] on the `Subcommand` enum in
//! `main.rs`.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all umiec CLI commands.
///
/// The `command_line` parameter contains the full command invocation for @PG records.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
