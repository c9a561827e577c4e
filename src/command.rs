use crate::env::Environment;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Object-safe trait for a command the shell runs in-process.
pub trait ExecutableCommand {
    /// Executes the command. Builtins that want the shell to stop set
    /// [`Environment::should_exit`].
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment)
    -> Result<ExitCode>;
}

/// Entry of the builtin table: creates a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Name this factory answers to.
    fn name(&self) -> &'static str;

    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}

/// What happened to one dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The shell loop should stop.
    Exit,
    /// A builtin ran and returned this status.
    Builtin(ExitCode),
    /// An external program ran and returned this status.
    External(ExitCode),
    /// A wildcard pattern was expanded.
    Wildcard,
    /// A `NAME=value` assignment was applied.
    Assignment,
    /// Nothing could run the command; the user has been told.
    NotFound,
    /// Nothing to do (empty command, or the command was skipped).
    NoOp,
    /// The command could not be resolved and the rest of the line was dropped.
    Aborted,
}

impl DispatchOutcome {
    pub fn is_exit(&self) -> bool {
        matches!(self, DispatchOutcome::Exit)
    }

    /// Whether the remaining commands of the line must not run.
    pub fn ends_line(&self) -> bool {
        matches!(self, DispatchOutcome::Exit | DispatchOutcome::Aborted)
    }
}
