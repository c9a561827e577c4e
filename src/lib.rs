//! `psh`, a small interactive shell.
//!
//! A line typed at the prompt is edited in raw terminal mode by the
//! [`editor`], split on unquoted `;` by the [`parser`], cut into words by the
//! [`lexer`], and each command is then dispatched by the [`Interpreter`]: to
//! an alias, an environment assignment, a builtin, the wildcard expander, or
//! an external program.
//!
//! The main entry point is [`Interpreter`], which owns all session state.

mod alias;
mod builtin;
pub mod command;
pub mod config;
pub mod editor;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod terminal;
pub mod wildcard;

pub use alias::{ALIAS_FILE, AliasTable};
pub use command::DispatchOutcome;
pub use config::{ShellConfig, WildcardTarget};
pub use error::ShellError;
pub use interpreter::Interpreter;
