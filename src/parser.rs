//! Line-level structure: splitting a finished input line into commands and
//! stripping trailing comments.

use crate::lexer::Quote;

/// Separator between commands on one line.
pub const COMMAND_SEPARATOR: char = ';';

/// Start of a comment running to the end of the line.
pub const COMMENT_MARKER: char = '#';

/// The commands of one input line, in execution order.
pub type CommandLine = Vec<String>;

/// Tracks which quote (if any) is open while scanning a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct QuoteTracker {
    open: Option<Quote>,
}

impl QuoteTracker {
    /// Updates the state for `ch`. A quote of one kind is literal while the
    /// other kind is open.
    fn feed(&mut self, ch: char) {
        if let Some(quote) = Quote::from_char(ch) {
            self.open = match self.open {
                None => Some(quote),
                Some(open) if open == quote => None,
                Some(open) => Some(open),
            };
        }
    }

    fn is_quoted(&self) -> bool {
        self.open.is_some()
    }
}

/// Splits `line` on every `;` that is not inside quotes.
///
/// Empty segments between separators are kept so that positions line up
/// with the separators, but a trailing empty segment is not produced, and a
/// line made only of separators yields no commands at all.
pub fn split_commands(line: &str) -> CommandLine {
    let mut commands = Vec::new();
    let mut quotes = QuoteTracker::default();
    let mut start = 0;

    for (pos, ch) in line.char_indices() {
        quotes.feed(ch);
        if ch == COMMAND_SEPARATOR && !quotes.is_quoted() {
            commands.push(line[start..pos].to_string());
            start = pos + ch.len_utf8();
        }
    }

    if start < line.len() {
        commands.push(line[start..].to_string());
    }

    if commands.iter().all(String::is_empty) {
        commands.clear();
    }
    commands
}

/// Returns `line` cut at the first `#` outside quotes.
pub fn strip_comment(line: &str) -> &str {
    let mut quotes = QuoteTracker::default();
    for (pos, ch) in line.char_indices() {
        quotes.feed(ch);
        if ch == COMMENT_MARKER && !quotes.is_quoted() {
            return &line[..pos];
        }
    }
    line
}
