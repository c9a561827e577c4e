use anyhow::{Context, Result};
use argh::FromArgs;
use psh::editor::{DEFAULT_MAX_LINE_LENGTH, finish_line};
use psh::history::{DEFAULT_HISTORY_CAPACITY, HistoryFiles};
use psh::{DispatchOutcome, Interpreter, ShellConfig, WildcardTarget};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PSH_LOG";

#[derive(FromArgs)]
/// A small interactive shell.
struct Args {
    /// long-lived history log (default: ./.files/MEMORY)
    #[argh(option)]
    history_file: Option<PathBuf>,

    /// directory for per-session history logs (default: ./.files/sessions)
    #[argh(option)]
    session_dir: Option<PathBuf>,

    /// number of history entries kept in memory
    #[argh(option, default = "DEFAULT_HISTORY_CAPACITY")]
    history_capacity: usize,

    /// maximum number of characters on one input line
    #[argh(option, default = "DEFAULT_MAX_LINE_LENGTH")]
    max_line_length: usize,

    /// expand a leading wildcard pattern itself instead of the next word
    #[argh(switch)]
    wildcard_on_command_name: bool,

    /// run one line and exit
    #[argh(option, short = 'c')]
    command: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn session_file(dir: &Path) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    dir.join(format!("session-{secs}-{}", std::process::id()))
}

fn history_files(args: &Args) -> Result<HistoryFiles> {
    let cwd = std::env::current_dir().context("can't get current directory")?;
    let files_dir = cwd.join(".files");
    let memory = args
        .history_file
        .clone()
        .unwrap_or_else(|| files_dir.join("MEMORY"));
    let session_dir = args
        .session_dir
        .clone()
        .unwrap_or_else(|| files_dir.join("sessions"));

    if let Some(parent) = memory.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("can't create {}", parent.display()))?;
    }
    fs::create_dir_all(&session_dir)
        .with_context(|| format!("can't create {}", session_dir.display()))?;

    Ok(HistoryFiles {
        memory,
        session: session_file(&session_dir),
    })
}

fn status_of(outcomes: &[DispatchOutcome]) -> u8 {
    match outcomes.last() {
        Some(DispatchOutcome::Builtin(code) | DispatchOutcome::External(code)) => {
            (*code & 0xff) as u8
        }
        Some(DispatchOutcome::NotFound) => 127,
        _ => 0,
    }
}

fn run(args: Args) -> Result<u8> {
    let wildcard_target = if args.wildcard_on_command_name {
        WildcardTarget::CommandName
    } else {
        WildcardTarget::Argument
    };
    let mut config = ShellConfig {
        history_files: None,
        history_capacity: args.history_capacity,
        max_line_length: args.max_line_length,
        wildcard_target,
    };

    if let Some(line) = &args.command {
        let mut sh = Interpreter::new(config);
        let outcomes = sh.run_line(&finish_line(line))?;
        return Ok(status_of(&outcomes));
    }

    config.history_files = Some(history_files(&args)?);
    tracing::debug!(files = ?config.history_files, "starting interactive session");
    Interpreter::new(config).repl()?;
    Ok(0)
}

fn main() -> ExitCode {
    init_tracing();
    let args: Args = argh::from_env();
    match run(args) {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("psh: {e:#}");
            ExitCode::FAILURE
        }
    }
}
