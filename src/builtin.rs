use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Names of every builtin, in the order `help` lists them.
pub(crate) const BUILTIN_NAMES: &[&str] = &["cd", "pwd", "echo", "env", "unset", "help", "exit"];

/// Commands the shell runs itself instead of spawning a program.
///
/// Arguments are parsed with [`argh`], so every builtin gets `--help` and
/// argument errors for free.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Name typed at the prompt.
    fn name() -> &'static str;

    /// Runs the builtin; 0 means success.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match T::execute(*self, stdout, env) {
            Ok(code) => Ok(code),
            Err(e) => {
                writeln!(stdout, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

/// Stands in for a builtin whose arguments did not parse, or that was
/// asked for `--help`.
struct ArgsReport {
    message: String,
    failed: bool,
}

impl ExecutableCommand for ArgsReport {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.message.trim_end())?;
        Ok(ExitCode::from(self.failed))
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        let command: Box<dyn ExecutableCommand> = match T::from_args(&[name], args) {
            Ok(parsed) => Box::new(parsed),
            Err(EarlyExit { output, status }) => Box::new(ArgsReport {
                message: output,
                failed: status.is_err(),
            }),
        };
        Some(command)
    }
}

/// The builtin table consulted by the dispatcher, in lookup order.
pub(crate) fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<PrintEnv>::default()),
        Box::new(Factory::<Unset>::default()),
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Exit>::default()),
    ]
}

#[derive(FromArgs)]
/// print the shell's working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// change the shell's working directory.
pub struct Cd {
    #[argh(positional)]
    /// target directory, `-` for the previous one; $HOME when omitted.
    pub target: Option<String>,
}

impl Cd {
    fn destination(&self, env: &Environment) -> Result<PathBuf> {
        let raw = match self.target.as_deref() {
            Some("-") => env.get_var("OLDPWD").context("cd: OLDPWD not set")?,
            Some(dir) if !dir.is_empty() => dir.to_string(),
            _ => env.get_var("HOME").context("cd: HOME not set")?,
        };
        Ok(env.current_dir.join(raw))
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let requested = self.destination(env)?;
        let resolved = fs::canonicalize(&requested)
            .with_context(|| format!("cd: {}", requested.display()))?;
        if !resolved.is_dir() {
            bail!("cd: {}: not a directory", requested.display());
        }
        std::env::set_current_dir(&resolved)
            .with_context(|| format!("cd: {}", resolved.display()))?;

        let previous = std::mem::replace(&mut env.current_dir, resolved);
        env.set_var("OLDPWD", previous.to_string_lossy());
        env.set_var("PWD", env.current_dir.to_string_lossy().into_owned());
        Ok(0)
    }
}

#[derive(FromArgs)]
/// leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// accepted for compatibility and ignored.
    pub _status: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print the arguments separated by single spaces.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// omit the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// words to print.
    pub words: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let terminator = if self.no_newline { "" } else { "\n" };
        write!(stdout, "{}{terminator}", self.words.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print the shell environment as NAME=value lines, sorted by name.
pub struct PrintEnv {}

impl BuiltinCommand for PrintEnv {
    fn name() -> &'static str {
        "env"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let mut vars: Vec<_> = env.vars.iter().collect();
        vars.sort();
        for (key, value) in vars {
            writeln!(stdout, "{key}={value}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// remove variables from the shell environment.
pub struct Unset {
    #[argh(positional, greedy)]
    /// names of the variables to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        for name in &self.names {
            env.remove_var(name);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// list the builtin commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "psh builtins:")?;
        for name in BUILTIN_NAMES {
            writeln!(stdout, "  {name}")?;
        }
        writeln!(stdout, "Anything else is looked up in PATH.")?;
        Ok(0)
    }
}
