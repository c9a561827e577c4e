//! User-defined command-name aliases read from the working directory.
//!
//! The table lives in `.files/ALIAS` under the current directory, one
//! `name=value` per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! ll=ls -la
//! alias gs='git status'
//! ```

use crate::lexer::{TokenizedCommand, tokenize};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Location of the alias file relative to the working directory.
pub const ALIAS_FILE: &str = ".files/ALIAS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// Loads the alias file at `path`. A missing file gives an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no alias file");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("can't read {}", path.display())),
        }
    }

    pub fn parse(contents: &str) -> Self {
        let mut aliases = HashMap::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("alias ").unwrap_or(line).trim_start();
            match line.split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => {
                    aliases.insert(name.trim().to_string(), unquote(value.trim()).to_string());
                }
                _ => warn!(line = lineno + 1, "skipping malformed alias"),
            }
        }
        Self { aliases }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Replaces the command name with its alias, if it has one.
    ///
    /// Only the first token is rewritten; an alias value with several words
    /// is spliced in its place and the remaining arguments follow unchanged.
    /// Expansion happens once, so an alias referring to another alias is not
    /// expanded again.
    pub fn expand(&self, mut tokens: TokenizedCommand) -> TokenizedCommand {
        let Some(value) = tokens.first().and_then(|name| self.get(name)) else {
            return tokens;
        };
        let replacement = tokenize(value);
        if replacement.is_empty() {
            return tokens;
        }
        debug!(alias = %tokens[0], expansion = %value, "expanding alias");
        tokens.splice(..1, replacement);
        tokens
    }
}

/// Strips one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
