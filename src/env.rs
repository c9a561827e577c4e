use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Session state shared by every command the shell runs.
///
/// `vars` is exactly what spawned programs see: it starts as a copy of the
/// process environment and then follows `NAME=value`, `unset` and `cd`.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    /// Working directory for builtins and children.
    pub current_dir: PathBuf,
    /// Raised by the `exit` builtin.
    pub should_exit: bool,
}

impl Environment {
    /// Snapshots the process environment and working directory.
    ///
    /// Variables whose name or value is not valid UTF-8 are left out.
    pub fn new() -> Self {
        let vars = stdenv::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn remove_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Applies a `NAME=value` word, splitting at the first `=`.
    ///
    /// Returns `false` (and changes nothing) when the name part is empty.
    pub fn assign(&mut self, word: &str) -> bool {
        match word.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                self.set_var(name, value);
                true
            }
            _ => false,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
