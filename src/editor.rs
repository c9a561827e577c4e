//! Interactive line editing on a raw terminal.
//!
//! Input bytes go through [`KeyState::step`], a pure decoder that turns
//! bytes (including `ESC [ x` arrow sequences and multi-byte UTF-8) into
//! [`Key`]s. [`LineEditor`] applies those keys to an [`EditBuffer`], echoes
//! the changes itself and talks to [`History`] for arrow-key recall.

use crate::error::ShellError;
use crate::history::{History, Recall};
use crate::parser::strip_comment;
use crate::terminal::KeySource;
use std::io::{self, Write};
use tracing::trace;

/// Default upper bound on the number of characters in one line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

const ESC: u8 = 0x1b;
const BRACKET: u8 = b'[';
const ARROW_UP: u8 = b'A';
const ARROW_DOWN: u8 = b'B';
const ARROW_RIGHT: u8 = b'C';
const ARROW_LEFT: u8 = b'D';
const BACKSPACE: u8 = 0x7f;
const CTRL_H: u8 = 0x08;
const CTRL_D: u8 = 0x04;

const CLEAR_LINE: &str = "\r\x1b[K";
const CLEAR_TO_END: &str = "\x1b[K";
const CURSOR_LEFT: &str = "\x08";

/// A decoded keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Up,
    Down,
    Left,
    Right,
    /// Ctrl-D.
    EndOfInput,
}

/// Decoder state between input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Normal,
    /// Saw `ESC`.
    EscapePending,
    /// Saw `ESC [`.
    EscapeBracket,
    /// Collecting the bytes of a multi-byte UTF-8 character.
    Utf8 { buf: [u8; 4], len: u8, need: u8 },
    /// A line was finished; no further input is decoded.
    Done,
}

impl KeyState {
    /// Feeds one byte, returning the next state and the key it completed.
    pub fn step(self, byte: u8) -> (KeyState, Option<Key>) {
        match self {
            KeyState::Normal => Self::step_normal(byte),
            KeyState::EscapePending => match byte {
                BRACKET => (KeyState::EscapeBracket, None),
                _ => (KeyState::Normal, None),
            },
            KeyState::EscapeBracket => {
                let key = match byte {
                    ARROW_UP => Some(Key::Up),
                    ARROW_DOWN => Some(Key::Down),
                    ARROW_RIGHT => Some(Key::Right),
                    ARROW_LEFT => Some(Key::Left),
                    _ => None,
                };
                (KeyState::Normal, key)
            }
            KeyState::Utf8 { mut buf, len, need } => {
                if byte & 0xc0 != 0x80 {
                    // Broken sequence: drop it and start over with this byte.
                    return Self::step_normal(byte);
                }
                buf[len as usize] = byte;
                let len = len + 1;
                if len < need {
                    return (KeyState::Utf8 { buf, len, need }, None);
                }
                let key = std::str::from_utf8(&buf[..len as usize])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .map(Key::Char);
                (KeyState::Normal, key)
            }
            KeyState::Done => (KeyState::Done, None),
        }
    }

    fn step_normal(byte: u8) -> (KeyState, Option<Key>) {
        match byte {
            ESC => (KeyState::EscapePending, None),
            b'\n' | b'\r' => (KeyState::Done, Some(Key::Enter)),
            BACKSPACE | CTRL_H => (KeyState::Normal, Some(Key::Backspace)),
            CTRL_D => (KeyState::Normal, Some(Key::EndOfInput)),
            0x20..=0x7e => (KeyState::Normal, Some(Key::Char(byte as char))),
            0xc0..=0xf7 => {
                let need = match byte {
                    0xc0..=0xdf => 2,
                    0xe0..=0xef => 3,
                    _ => 4,
                };
                let mut buf = [0u8; 4];
                buf[0] = byte;
                (KeyState::Utf8 { buf, len: 1, need }, None)
            }
            _ => (KeyState::Normal, None),
        }
    }
}

/// The line being edited, with a cursor.
///
/// Always `cursor <= len() <= max_len`.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    chars: Vec<char>,
    cursor: usize,
    max_len: usize,
}

impl EditBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            chars: Vec::with_capacity(max_len),
            cursor: 0,
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.chars.len() >= self.max_len
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Inserts at the cursor and advances it. Returns `false` when full.
    pub fn insert(&mut self, ch: char) -> bool {
        if self.is_full() {
            return false;
        }
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
        true
    }

    /// Deletes the character left of the cursor.
    pub fn delete_before_cursor(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Moves right, returning the character stepped over.
    pub fn move_right(&mut self) -> Option<char> {
        let ch = self.chars.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(ch)
    }

    /// Replaces the contents (truncated to the maximum length) and puts the
    /// cursor at the end.
    pub fn replace(&mut self, text: &str) {
        self.chars.clear();
        self.chars.extend(text.chars().take(self.max_len));
        self.cursor = self.chars.len();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
    }

    /// Characters from the cursor to the end.
    pub fn suffix(&self) -> &[char] {
        &self.chars[self.cursor..]
    }

    pub fn as_chars(&self) -> &[char] {
        &self.chars
    }

    pub fn to_line(&self) -> String {
        self.chars.iter().collect()
    }
}

/// Trims a finished line and cuts it at the first unquoted `#`.
pub fn finish_line(raw: &str) -> String {
    strip_comment(raw.trim()).trim().to_string()
}

/// Reads one line at a time from a [`KeySource`], echoing to a writer.
#[derive(Debug, Clone)]
pub struct LineEditor {
    max_line_length: usize,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineEditor {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length: max_line_length.max(1),
        }
    }

    /// Runs one edit cycle.
    ///
    /// Returns the trimmed, comment-stripped line (possibly empty), or
    /// `None` when input ended on an empty buffer. Non-empty lines are
    /// recorded in `history`; persisting them is left to the caller.
    pub fn read_line(
        &self,
        prompt: &str,
        keys: &mut dyn KeySource,
        out: &mut dyn Write,
        history: &mut History,
    ) -> Result<Option<String>, ShellError> {
        history.ensure_loaded()?;
        history.reset_recall();

        let mut buffer = EditBuffer::new(self.max_line_length);
        let mut state = KeyState::Normal;
        write!(out, "{prompt}").map_err(ShellError::Terminal)?;
        out.flush().map_err(ShellError::Terminal)?;

        while state != KeyState::Done {
            let Some(byte) = keys.next_byte().map_err(ShellError::Terminal)? else {
                if buffer.is_empty() {
                    return Ok(None);
                }
                break;
            };
            let (next, key) = state.step(byte);
            state = next;
            let Some(key) = key else { continue };
            trace!(?key, cursor = buffer.cursor(), "key");

            if key == Key::EndOfInput {
                if buffer.is_empty() {
                    writeln!(out).map_err(ShellError::Terminal)?;
                    return Ok(None);
                }
                continue;
            }
            apply_key(key, &mut buffer, prompt, history, out).map_err(ShellError::Terminal)?;
            out.flush().map_err(ShellError::Terminal)?;
        }

        let line = finish_line(&buffer.to_line());
        if !line.is_empty() {
            history.record(line.clone());
        }
        Ok(Some(line))
    }
}

fn apply_key(
    key: Key,
    buffer: &mut EditBuffer,
    prompt: &str,
    history: &mut History,
    out: &mut dyn Write,
) -> io::Result<()> {
    match key {
        Key::Char(ch) => {
            if buffer.insert(ch) {
                write!(out, "{ch}")?;
                redraw_suffix(buffer, out)?;
            }
        }
        Key::Backspace => {
            if buffer.delete_before_cursor() {
                write!(out, "{CURSOR_LEFT}{CLEAR_TO_END}")?;
                redraw_suffix(buffer, out)?;
            }
        }
        Key::Up | Key::Down => {
            let direction = if key == Key::Up {
                Recall::Older
            } else {
                Recall::Newer
            };
            buffer.replace(history.recall(direction));
            write!(out, "{CLEAR_LINE}{prompt}")?;
            write_chars(buffer.as_chars(), out)?;
        }
        Key::Left => {
            if buffer.move_left() {
                write!(out, "{CURSOR_LEFT}")?;
            }
        }
        Key::Right => {
            if let Some(ch) = buffer.move_right() {
                write!(out, "{ch}")?;
            }
        }
        Key::Enter => writeln!(out)?,
        Key::EndOfInput => {}
    }
    Ok(())
}

/// Prints the text after the cursor, then walks the terminal cursor back.
fn redraw_suffix(buffer: &EditBuffer, out: &mut dyn Write) -> io::Result<()> {
    let suffix = buffer.suffix();
    write_chars(suffix, out)?;
    for _ in suffix {
        write!(out, "{CURSOR_LEFT}")?;
    }
    Ok(())
}

fn write_chars(chars: &[char], out: &mut dyn Write) -> io::Result<()> {
    let mut utf8 = [0u8; 4];
    for ch in chars {
        out.write_all(ch.encode_utf8(&mut utf8).as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::ScriptedKeys;

    fn feed(bytes: &[u8]) -> Vec<Key> {
        let mut state = KeyState::Normal;
        let mut keys = Vec::new();
        for &b in bytes {
            let (next, key) = state.step(b);
            state = next;
            keys.extend(key);
        }
        keys
    }

    fn read(input: &[u8], history: &mut History) -> (Option<String>, String) {
        let mut keys = ScriptedKeys::new(input.to_vec());
        let mut out = Vec::<u8>::new();
        let line = LineEditor::new(64)
            .read_line("$ ", &mut keys, &mut out, history)
            .unwrap();
        (line, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_decode_arrows() {
        assert_eq!(
            feed(b"\x1b[A\x1b[B\x1b[C\x1b[D"),
            vec![Key::Up, Key::Down, Key::Right, Key::Left]
        );
    }

    #[test]
    fn test_decode_unknown_escape_is_dropped() {
        assert_eq!(feed(b"\x1b[Zx\x1bOy"), vec![Key::Char('x'), Key::Char('y')]);
    }

    #[test]
    fn test_decode_enter_moves_to_done() {
        assert_eq!(KeyState::Normal.step(b'\n'), (KeyState::Done, Some(Key::Enter)));
        assert_eq!(KeyState::Normal.step(b'\r'), (KeyState::Done, Some(Key::Enter)));
        assert_eq!(KeyState::Done.step(b'a'), (KeyState::Done, None));
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(feed("é€".as_bytes()), vec![Key::Char('é'), Key::Char('€')]);
        // Truncated sequence followed by ASCII keeps the ASCII byte.
        assert_eq!(feed(&[0xe2, 0x82, b'a']), vec![Key::Char('a')]);
    }

    #[test]
    fn test_decode_backspace_variants() {
        assert_eq!(feed(&[0x7f, 0x08]), vec![Key::Backspace, Key::Backspace]);
    }

    #[test]
    fn test_buffer_insert_and_delete_in_middle() {
        let mut buffer = EditBuffer::new(16);
        for ch in "acd".chars() {
            buffer.insert(ch);
        }
        buffer.move_left();
        buffer.move_left();
        buffer.insert('b');
        assert_eq!(buffer.to_line(), "abcd");
        assert_eq!(buffer.cursor(), 2);

        assert!(buffer.delete_before_cursor());
        assert_eq!(buffer.to_line(), "acd");
        assert_eq!(buffer.cursor(), 1);
        assert_eq!(buffer.suffix(), &['c', 'd']);
    }

    #[test]
    fn test_buffer_bounds() {
        let mut buffer = EditBuffer::new(2);
        assert!(!buffer.move_left());
        assert!(!buffer.delete_before_cursor());
        assert!(buffer.insert('a'));
        assert!(buffer.insert('b'));
        assert!(!buffer.insert('c'));
        assert_eq!(buffer.move_right(), None);
        assert!(buffer.cursor() <= buffer.len());

        buffer.replace("xyz");
        assert_eq!(buffer.to_line(), "xy");
        assert_eq!(buffer.cursor(), 2);
    }

    #[test]
    fn test_finish_line() {
        assert_eq!(finish_line("  ls -la # comment "), "ls -la");
        assert_eq!(finish_line("# just a comment"), "");
        assert_eq!(finish_line("echo '# kept'"), "echo '# kept'");
    }

    #[test]
    fn test_read_line_records_history() {
        let mut history = History::in_memory(8);
        let (line, out) = read(b"ls -la # comment\n", &mut history);
        assert_eq!(line.as_deref(), Some("ls -la"));
        assert!(out.starts_with("$ "));
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["ls -la"]);
    }

    #[test]
    fn test_read_line_empty_line_not_recorded() {
        let mut history = History::in_memory(8);
        let (line, _) = read(b"   \n", &mut history);
        assert_eq!(line.as_deref(), Some(""));
        assert!(history.is_empty());
    }

    #[test]
    fn test_read_line_edits_in_middle() {
        let mut history = History::in_memory(8);
        // Step back to insert the missing 'c', then type and erase a '!'.
        let (line, _) = read(b"eho\x1b[D\x1b[Dc\x1b[C\x1b[C!\x7f\n", &mut history);
        assert_eq!(line.as_deref(), Some("echo"));
    }

    #[test]
    fn test_read_line_recalls_history() {
        let mut history = History::in_memory(8);
        history.record("first");
        history.record("second");

        let (line, out) = read(b"\x1b[A\x1b[A\n", &mut history);
        assert_eq!(line.as_deref(), Some("first"));
        assert!(out.contains("\r\x1b[K$ second"));
        assert!(out.contains("\r\x1b[K$ first"));
    }

    #[test]
    fn test_read_line_up_then_down_is_empty() {
        let mut history = History::in_memory(8);
        history.record("ls");
        let (line, _) = read(b"\x1b[A\x1b[B\n", &mut history);
        assert_eq!(line.as_deref(), Some(""));
    }

    #[test]
    fn test_read_line_recall_then_edit() {
        let mut history = History::in_memory(8);
        history.record("echo hi");
        let (line, _) = read(b"\x1b[A there\n", &mut history);
        assert_eq!(line.as_deref(), Some("echo hi there"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_read_line_end_of_input() {
        let mut history = History::in_memory(8);
        assert_eq!(read(b"", &mut history).0, None);
        assert_eq!(read(&[CTRL_D], &mut history).0, None);
        // Ctrl-D is ignored while there is text; EOF finishes the line.
        assert_eq!(read(&[b'l', CTRL_D, b's'], &mut history).0.as_deref(), Some("ls"));
    }

    #[test]
    fn test_read_line_respects_max_length() {
        let mut history = History::in_memory(8);
        let mut keys = ScriptedKeys::new(b"abcdef\n".to_vec());
        let mut out = Vec::<u8>::new();
        let line = LineEditor::new(3)
            .read_line("", &mut keys, &mut out, &mut history)
            .unwrap();
        assert_eq!(line.as_deref(), Some("abc"));
    }

    #[test]
    fn test_insert_echo_repositions_cursor() {
        let mut history = History::in_memory(8);
        let (_, out) = read(b"ac\x1b[Db\n", &mut history);
        // After inserting 'b' before 'c' the suffix is redrawn and the cursor
        // steps back over it.
        assert!(out.contains("bc\x08"));
    }
}
