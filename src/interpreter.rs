use crate::alias::{ALIAS_FILE, AliasTable};
use crate::builtin::default_builtins;
use crate::command::{CommandFactory, DispatchOutcome};
use crate::config::{ShellConfig, WildcardTarget};
use crate::editor::LineEditor;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::ExternalCommand;
use crate::history::History;
use crate::lexer::{TokenizedCommand, tokenize};
use crate::parser::split_commands;
use crate::terminal::{KeySource, RawModeGuard, StdinKeys};
use crate::wildcard;
use std::io::{self, Write};
use tracing::{debug, error, warn};

/// Command name that ends the session before any other lookup.
const EXIT_COMMAND: &str = "exit";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the builtins defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// One interactive shell session.
///
/// Owns everything that lives longer than a single line: the [`Environment`],
/// the [`History`], the builtin table and the [`ShellConfig`]. Lines go
/// through [`split_commands`], [`tokenize`] and then [`Interpreter::dispatch`].
///
/// Example
/// ```
/// use psh::{DispatchOutcome, Interpreter};
/// let mut sh = Interpreter::default();
/// let mut out = Vec::<u8>::new();
/// let outcomes = sh.run_line_with_output("echo hello; echo world", &mut out).unwrap();
/// assert_eq!(outcomes, vec![DispatchOutcome::Builtin(0); 2]);
/// assert_eq!(String::from_utf8(out).unwrap(), "hello\nworld\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    history: History,
    editor: LineEditor,
    config: ShellConfig,
}

impl Interpreter {
    /// Create a session with the default builtins.
    pub fn new(config: ShellConfig) -> Self {
        Self::with_commands(config, default_builtins())
    }

    /// Create a session with a custom builtin table.
    pub fn with_commands(config: ShellConfig, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        let history = match &config.history_files {
            Some(files) => History::new(config.history_capacity, files.clone()),
            None => History::in_memory(config.history_capacity),
        };
        Self {
            env: Environment::new(),
            commands,
            history,
            editor: LineEditor::new(config.max_line_length),
            config,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn builtin_names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    pub fn prompt(&self) -> String {
        format!("psh:{}$ ", self.env.current_dir.display())
    }

    /// Interactive loop on the real terminal.
    ///
    /// Returns when input ends or a command asks to exit. Errors are fatal
    /// to the session.
    pub fn repl(&mut self) -> Result<(), ShellError> {
        let mut keys = StdinKeys::new();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_loop(&mut keys, &mut out, true)
    }

    /// Interactive loop over an arbitrary key source, without touching the
    /// terminal mode.
    pub fn repl_with(
        &mut self,
        keys: &mut dyn KeySource,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        self.run_loop(keys, out, false)
    }

    fn run_loop(
        &mut self,
        keys: &mut dyn KeySource,
        out: &mut dyn Write,
        raw_mode: bool,
    ) -> Result<(), ShellError> {
        loop {
            let Some(line) = self.next_line(keys, out, raw_mode)? else {
                debug!("end of input");
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }
            self.history.persist(&line)?;
            let outcomes = self.run_line_with_output(&line, out)?;
            if outcomes.last().is_some_and(DispatchOutcome::is_exit) {
                return Ok(());
            }
        }
    }

    fn next_line(
        &mut self,
        keys: &mut dyn KeySource,
        out: &mut dyn Write,
        raw_mode: bool,
    ) -> Result<Option<String>, ShellError> {
        let prompt = self.prompt();
        let _raw = if raw_mode {
            Some(RawModeGuard::new().map_err(ShellError::Terminal)?)
        } else {
            None
        };
        self.editor.read_line(&prompt, keys, out, &mut self.history)
    }

    /// Runs every command of `line`, writing builtin output to stdout.
    pub fn run_line(&mut self, line: &str) -> Result<Vec<DispatchOutcome>, ShellError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_line_with_output(line, &mut out)
    }

    /// Runs every command of `line` left to right, stopping after one that
    /// asks to exit or aborts the line. External programs still write to the
    /// inherited stdout.
    pub fn run_line_with_output(
        &mut self,
        line: &str,
        out: &mut dyn Write,
    ) -> Result<Vec<DispatchOutcome>, ShellError> {
        let mut outcomes = Vec::new();
        for command in split_commands(line) {
            let outcome = self.dispatch(tokenize(&command), out)?;
            outcomes.push(outcome);
            if outcome.ends_line() {
                break;
            }
        }
        out.flush().map_err(ShellError::Terminal)?;
        Ok(outcomes)
    }

    /// Resolves and runs one tokenized command.
    ///
    /// Order: `exit`, alias expansion, `NAME=value`, builtins, wildcard
    /// patterns, external programs.
    pub fn dispatch(
        &mut self,
        tokens: TokenizedCommand,
        out: &mut dyn Write,
    ) -> Result<DispatchOutcome, ShellError> {
        let Some(first) = tokens.first() else {
            return Ok(DispatchOutcome::NoOp);
        };
        if first == EXIT_COMMAND {
            debug!("exit requested");
            return Ok(DispatchOutcome::Exit);
        }

        let cwd = match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(e) => {
                error!(error = %e, "failed to get current working directory");
                writeln!(out, "psh: failed to get current working directory: {e}")
                    .map_err(ShellError::Terminal)?;
                return Ok(DispatchOutcome::Aborted);
            }
        };
        let aliases = AliasTable::load(&cwd.join(ALIAS_FILE)).unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "ignoring alias file");
            AliasTable::default()
        });
        let tokens = aliases.expand(tokens);
        let name = tokens[0].as_str();

        if name.contains('=') {
            if !self.env.assign(name) {
                writeln!(out, "psh: invalid assignment: {name}").map_err(ShellError::Terminal)?;
            }
            return Ok(DispatchOutcome::Assignment);
        }

        let args: Vec<&str> = tokens[1..].iter().map(String::as_str).collect();
        for factory in &self.commands {
            let Some(cmd) = factory.try_create(&self.env, name, &args) else {
                continue;
            };
            debug!(builtin = factory.name(), "running builtin");
            let code = cmd.execute(out, &mut self.env).unwrap_or_else(|e| {
                warn!(builtin = factory.name(), error = %e, "builtin failed");
                1
            });
            if self.env.should_exit {
                return Ok(DispatchOutcome::Exit);
            }
            return Ok(DispatchOutcome::Builtin(code));
        }

        if wildcard::is_pattern(name) {
            if name.contains('?') {
                return Self::not_found(name, out);
            }
            let pattern = match self.config.wildcard_target {
                WildcardTarget::Argument => tokens.get(1),
                WildcardTarget::CommandName => tokens.first(),
            };
            let Some(pattern) = pattern else {
                return Self::not_found(name, out);
            };
            debug!(%pattern, "expanding wildcard");
            wildcard::print_matches(pattern, &cwd, out).map_err(ShellError::Terminal)?;
            return Ok(DispatchOutcome::Wildcard);
        }

        // The child writes to fd 1 directly; earlier builtin output must land first.
        out.flush().map_err(ShellError::Terminal)?;
        match ExternalCommand::new(&tokens).run(&self.env)? {
            Some(code) => Ok(DispatchOutcome::External(code)),
            None => Self::not_found(name, out),
        }
    }

    fn not_found(name: &str, out: &mut dyn Write) -> Result<DispatchOutcome, ShellError> {
        writeln!(out, "psh: No command found: {name}").map_err(ShellError::Terminal)?;
        Ok(DispatchOutcome::NotFound)
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default builtins and in-memory history.
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ExecutableCommand, ExitCode};
    use crate::test_support::lock_current_dir;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Builtin table entry that only counts lookups.
    struct CountingFactory {
        lookups: Rc<Cell<usize>>,
    }

    impl CommandFactory for CountingFactory {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn try_create(
            &self,
            _env: &Environment,
            _name: &str,
            _args: &[&str],
        ) -> Option<Box<dyn ExecutableCommand>> {
            self.lookups.set(self.lookups.get() + 1);
            None
        }
    }

    fn run(sh: &mut Interpreter, line: &str) -> (Vec<DispatchOutcome>, String) {
        let mut out = Vec::<u8>::new();
        let outcomes = sh.run_line_with_output(line, &mut out).unwrap();
        (outcomes, String::from_utf8(out).unwrap())
    }

    fn words(s: &[&str]) -> TokenizedCommand {
        s.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_commands_run_in_order() {
        let mut sh = Interpreter::default();
        let (outcomes, out) = run(&mut sh, "echo hi; echo bye");
        assert_eq!(outcomes, vec![DispatchOutcome::Builtin(0), DispatchOutcome::Builtin(0)]);
        assert_eq!(out, "hi\nbye\n");
    }

    #[test]
    fn test_quotes_survive_splitting_and_tokenizing() {
        let mut sh = Interpreter::default();
        assert_eq!(run(&mut sh, r#"echo "a; b"   'c  d'"#).1, "a; b c d\n");
        assert_eq!(run(&mut sh, r#"echo "a b"#).1, "a b\n");
    }

    #[test]
    fn test_exit_stops_the_line() {
        let mut sh = Interpreter::default();
        let (outcomes, out) = run(&mut sh, "exit; echo never");
        assert_eq!(outcomes, vec![DispatchOutcome::Exit]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_assignment_skips_builtins_and_spawn() {
        let lookups = Rc::new(Cell::new(0));
        let factory = CountingFactory {
            lookups: lookups.clone(),
        };
        let mut sh = Interpreter::with_commands(ShellConfig::default(), vec![Box::new(factory)]);

        let (outcomes, out) = run(&mut sh, "FOO=bar");
        assert_eq!(outcomes, vec![DispatchOutcome::Assignment]);
        assert!(out.is_empty());
        assert_eq!(lookups.get(), 0);
        assert_eq!(sh.env().get_var("FOO").as_deref(), Some("bar"));
    }

    #[test]
    fn test_invalid_assignment_is_reported() {
        let mut sh = Interpreter::default();
        let (outcomes, out) = run(&mut sh, "=oops");
        assert_eq!(outcomes, vec![DispatchOutcome::Assignment]);
        assert_eq!(out, "psh: invalid assignment: =oops\n");
    }

    #[test]
    fn test_unknown_command() {
        let mut sh = Interpreter::default();
        let (outcomes, out) = run(&mut sh, "psh-definitely-missing arg");
        assert_eq!(outcomes, vec![DispatchOutcome::NotFound]);
        assert_eq!(out, "psh: No command found: psh-definitely-missing\n");
    }

    #[test]
    fn test_question_mark_command_is_not_expanded() {
        let mut sh = Interpreter::default();
        let (outcomes, out) = run(&mut sh, "l? /tmp/*");
        assert_eq!(outcomes, vec![DispatchOutcome::NotFound]);
        assert_eq!(out, "psh: No command found: l?\n");
    }

    #[test]
    fn test_wildcard_expands_argument_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "").unwrap();
        std::fs::write(dir.path().join("two.txt"), "").unwrap();
        let pattern = format!("{}/*.txt", dir.path().display());

        let mut sh = Interpreter::default();
        let mut out = Vec::<u8>::new();
        let outcome = sh.dispatch(words(&["*", pattern.as_str()]), &mut out).unwrap();
        assert_eq!(outcome, DispatchOutcome::Wildcard);
        let root = dir.path().display();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{root}/one.txt {root}/two.txt\n")
        );
    }

    #[test]
    fn test_wildcard_can_expand_command_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "").unwrap();
        let pattern = format!("{}/*.txt", dir.path().display());

        let config = ShellConfig {
            wildcard_target: WildcardTarget::CommandName,
            ..ShellConfig::default()
        };
        let mut sh = Interpreter::new(config);
        let mut out = Vec::<u8>::new();
        let outcome = sh.dispatch(words(&[pattern.as_str(), "ignored"]), &mut out).unwrap();
        assert_eq!(outcome, DispatchOutcome::Wildcard);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}/one.txt\n", dir.path().display())
        );
    }

    #[test]
    fn test_wildcard_without_argument() {
        let mut sh = Interpreter::default();
        let mut out = Vec::<u8>::new();
        let outcome = sh.dispatch(words(&["*.rs"]), &mut out).unwrap();
        assert_eq!(outcome, DispatchOutcome::NotFound);
    }

    #[test]
    fn test_empty_input() {
        let mut sh = Interpreter::default();
        assert!(run(&mut sh, ";;").0.is_empty());
        assert!(run(&mut sh, "").0.is_empty());
        let (outcomes, _) = run(&mut sh, "echo a;;echo b");
        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::Builtin(0),
                DispatchOutcome::NoOp,
                DispatchOutcome::Builtin(0)
            ]
        );
    }

    #[test]
    fn test_builtin_status_is_propagated() {
        let mut sh = Interpreter::default();
        let (outcomes, out) = run(&mut sh, "pwd --bogus");
        assert_eq!(outcomes, vec![DispatchOutcome::Builtin(1)]);
        assert!(!out.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_external_status_is_propagated() {
        // Children run in the captured working directory.
        let _lock = lock_current_dir();
        let mut sh = Interpreter::default();
        let (outcomes, _) = run(&mut sh, "true; false; sh -c 'exit 3'");
        let codes: Vec<ExitCode> = outcomes
            .iter()
            .map(|o| match o {
                DispatchOutcome::External(code) => *code,
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();
        assert_eq!(codes, vec![0, 1, 3]);
    }

    /// Buffers writes and appends them to a file only when flushed, like a
    /// stdout buffer in front of the descriptor children share.
    struct FlushToFile {
        pending: Vec<u8>,
        path: std::path::PathBuf,
    }

    impl Write for FlushToFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(&self.pending)?;
            self.pending.clear();
            Ok(())
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_builtin_output_lands_before_child_output() {
        let _lock = lock_current_dir();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout");
        let mut out = FlushToFile {
            pending: Vec::new(),
            path: path.clone(),
        };

        let mut sh = Interpreter::default();
        let line = format!(
            "echo -n A; sh -c 'printf B >> {0}'; echo -n C; sh -c 'printf D >> {0}'",
            path.display()
        );
        let outcomes = sh.run_line_with_output(&line, &mut out).unwrap();
        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::Builtin(0),
                DispatchOutcome::External(0),
                DispatchOutcome::Builtin(0),
                DispatchOutcome::External(0)
            ]
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ABCD");
    }

    #[test]
    fn test_builtin_names() {
        let sh = Interpreter::default();
        assert!(sh.builtin_names().contains(&"cd"));
        assert!(sh.prompt().starts_with("psh:"));
    }
}
