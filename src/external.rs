use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::debug;

/// A program outside the shell, with its full argument vector.
pub struct ExternalCommand<'a> {
    argv: &'a [String],
}

impl<'a> ExternalCommand<'a> {
    /// `argv[0]` is the program name as typed.
    pub fn new(argv: &'a [String]) -> Self {
        Self { argv }
    }

    /// Resolves, spawns and waits for the program.
    ///
    /// Returns `Ok(None)` when the program cannot be found or started; the
    /// child inherits stdin, stdout and stderr. A failed wait is fatal.
    pub fn run(&self, env: &Environment) -> Result<Option<ExitCode>, ShellError> {
        let Some(name) = self.argv.first() else {
            return Ok(None);
        };
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let Some(program) = resolve_program(name, OsStr::new(&search_paths), &env.current_dir)
        else {
            debug!(command = %name, "no such program");
            return Ok(None);
        };

        let mut cmd = Command::new(&program);
        cmd.args(&self.argv[1..])
            .env_clear()
            .envs(&env.vars)
            .current_dir(&env.current_dir);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(name);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!(program = %program.display(), error = %e, "spawn failed");
                return Ok(None);
            }
        };
        let status = child.wait().map_err(ShellError::Wait)?;
        debug!(command = %name, %status, "child finished");
        Ok(Some(status_code(status)))
    }
}

/// Exit code of a finished child; `128 + signal` when it was killed.
fn status_code(status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Finds the program a command word names.
///
/// A word containing `/` is a path, taken relative to `cwd` unless absolute.
/// Any other word is looked up in the `search_paths` directories in order;
/// empty entries are skipped. Only regular files are accepted.
pub fn resolve_program(word: &str, search_paths: &OsStr, cwd: &Path) -> Option<PathBuf> {
    if word.is_empty() {
        return None;
    }
    if word.contains('/') {
        let path = cwd.join(word);
        return path.is_file().then_some(path);
    }
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| cwd.join(dir).join(word))
        .find(|candidate| candidate.is_file())
}
