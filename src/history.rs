//! Bounded log of accepted input lines with arrow-key recall.

use crate::error::ShellError;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default number of entries kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 4096;

/// The two append-only logs every accepted line is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFiles {
    /// Log shared by all sessions; also the source for lazy loading.
    pub memory: PathBuf,
    /// Log for the current session only.
    pub session: PathBuf,
}

/// Direction of one recall step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall {
    Older,
    Newer,
}

/// Previously accepted lines, oldest first.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
    /// `None` while not recalling, otherwise how many steps back from the
    /// most recent entry.
    cursor: Option<usize>,
    files: Option<HistoryFiles>,
    loaded: bool,
}

impl History {
    /// History backed by `files`; prior entries are read on first use.
    pub fn new(capacity: usize, files: HistoryFiles) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            cursor: None,
            files: Some(files),
            loaded: false,
        }
    }

    /// History that is never read from or written to disk.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            cursor: None,
            files: None,
            loaded: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Reads the long-lived log once per session.
    ///
    /// A missing log is an empty history; invalid UTF-8 is replaced rather
    /// than rejected.
    pub fn ensure_loaded(&mut self) -> Result<(), ShellError> {
        if self.loaded {
            return Ok(());
        }
        self.loaded = true;

        let Some(files) = &self.files else {
            return Ok(());
        };
        let path = files.memory.clone();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no history log yet");
                return Ok(());
            }
            Err(e) => return Err(ShellError::history(path, e)),
        };

        // Lines written by other tools may not be UTF-8.
        let contents = String::from_utf8_lossy(&bytes);
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            self.record(line);
        }
        debug!(path = %path.display(), entries = self.len(), "loaded history");
        Ok(())
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn record(&mut self, line: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
    }

    /// Leaves recall mode; called at the start of every edit cycle.
    pub fn reset_recall(&mut self) {
        self.cursor = None;
    }

    pub fn is_recalling(&self) -> bool {
        self.cursor.is_some()
    }

    /// Moves the recall cursor one step and returns the entry it lands on,
    /// or an empty string once it leaves recall mode.
    ///
    /// Stepping older past the oldest entry stays on the oldest entry.
    pub fn recall(&mut self, direction: Recall) -> &str {
        self.cursor = match (direction, self.cursor) {
            (Recall::Older, None) if !self.entries.is_empty() => Some(0),
            (Recall::Older, Some(n)) if n + 1 < self.entries.len() => Some(n + 1),
            (Recall::Newer, Some(0)) => None,
            (Recall::Newer, Some(n)) => Some(n - 1),
            (_, cursor) => cursor,
        };

        match self.cursor {
            Some(n) => self.entries[self.entries.len() - 1 - n].as_str(),
            None => "",
        }
    }

    /// Appends `entry` to both history logs.
    ///
    /// Both logs are opened before either is written, so a log that cannot
    /// be opened leaves the other one untouched.
    pub fn persist(&self, entry: &str) -> Result<(), ShellError> {
        let Some(files) = &self.files else {
            return Ok(());
        };
        let mut memory = open_log(&files.memory)?;
        let mut session = open_log(&files.session)?;
        writeln!(memory, "{entry}").map_err(|e| ShellError::history(&files.memory, e))?;
        writeln!(session, "{entry}").map_err(|e| ShellError::history(&files.session, e))
    }
}

fn open_log(path: &Path) -> Result<fs::File, ShellError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ShellError::history(path, e))
}
