use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that end the shell session.
///
/// Unknown commands, builtin failures and unreadable alias files are only
/// reported; the loop keeps going. Messages leave the cause to the source
/// chain, so print with `{:#}` through `anyhow` or walk `source()`.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A history log could not be opened, read or appended to.
    #[error("history file {}", .path.display())]
    HistoryIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading keys or switching terminal modes failed.
    #[error("terminal")]
    Terminal(#[source] io::Error),

    /// Waiting for a child process failed.
    #[error("waiting for child")]
    Wait(#[source] io::Error),
}

impl ShellError {
    pub(crate) fn history(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ShellError::HistoryIo {
            path: path.into(),
            source,
        }
    }
}
