//! Terminal utilities.
//!
//! Raw input mode for the line editor and a byte source that waits for
//! keystrokes with a bounded poll.

use std::io;

/// How long one poll for a keystroke may block.
const POLL_TIMEOUT_MS: i32 = 50;

/// Source of raw input bytes for the line editor.
pub trait KeySource {
    /// Returns the next byte, or `None` at end of input.
    fn next_byte(&mut self) -> io::Result<Option<u8>>;
}

/// Disables canonical line buffering and echo on stdin while alive.
///
/// Output processing is left alone so `\n` still moves to the start of the
/// next line. If stdin is not a terminal this is a no-op.
pub struct RawModeGuard {
    #[cfg(unix)]
    original: Option<libc::termios>,
}

impl RawModeGuard {
    pub fn new() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = io::stdin().as_raw_fd();

            if unsafe { libc::isatty(fd) } == 0 {
                return Ok(Self { original: None });
            }

            let mut termios: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
                return Err(io::Error::last_os_error());
            }
            let original = termios;

            termios.c_lflag &= !(libc::ICANON | libc::ECHO);
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self {
                original: Some(original),
            })
        }

        #[cfg(not(unix))]
        Ok(Self {})
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(original) = self.original {
            use std::os::unix::io::AsRawFd;
            let fd = io::stdin().as_raw_fd();
            unsafe { libc::tcsetattr(fd, libc::TCSANOW, &original) };
        }
    }
}

/// Reads stdin one byte at a time, bypassing std's buffered `Stdin` so a
/// poll on the descriptor never misses bytes sitting in a userspace buffer.
#[derive(Debug, Default)]
pub struct StdinKeys;

impl StdinKeys {
    pub fn new() -> Self {
        StdinKeys
    }

    /// Waits up to `POLL_TIMEOUT_MS` for input; `true` if a byte is ready.
    #[cfg(unix)]
    fn key_available(&self) -> io::Result<bool> {
        use std::os::unix::io::AsRawFd;
        let mut pfd = libc::pollfd {
            fd: io::stdin().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        match unsafe { libc::poll(&mut pfd, 1, POLL_TIMEOUT_MS) } {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
            0 => Ok(false),
            _ => Ok(true),
        }
    }
}

impl KeySource for StdinKeys {
    #[cfg(unix)]
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        use std::os::unix::io::AsRawFd;
        let fd = io::stdin().as_raw_fd();
        let mut byte = 0u8;
        loop {
            if !self.key_available()? {
                continue;
            }
            let n = unsafe { libc::read(fd, (&mut byte as *mut u8).cast(), 1) };
            match n {
                1 => return Ok(Some(byte)),
                0 => return Ok(None),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        use std::io::Read;
        let mut buf = [0u8; 1];
        match io::stdin().read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// Replays a fixed byte sequence; handy for driving the editor without a
/// terminal.
#[derive(Debug, Clone)]
pub struct ScriptedKeys {
    bytes: std::vec::IntoIter<u8>,
}

impl ScriptedKeys {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into_iter(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.bytes.next())
    }
}
