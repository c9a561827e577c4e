use crate::editor::DEFAULT_MAX_LINE_LENGTH;
use crate::history::{DEFAULT_HISTORY_CAPACITY, HistoryFiles};

/// Which word a command starting with a wildcard pattern expands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WildcardTarget {
    /// The word after the command name, e.g. the second word of `* src/*.rs`.
    #[default]
    Argument,
    /// The command name itself.
    CommandName,
}

/// Settings for one shell session.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// History logs; `None` keeps history in memory only.
    pub history_files: Option<HistoryFiles>,
    pub history_capacity: usize,
    pub max_line_length: usize,
    pub wildcard_target: WildcardTarget,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_files: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            wildcard_target: WildcardTarget::default(),
        }
    }
}
