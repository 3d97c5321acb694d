//! Line framer: byte stream -> complete `\n`-terminated records.
//!
//! Drains the buffer up to each `\n` it finds, keeping the partial-line
//! remainder as its own resumable struct so it survives across chunk
//! boundaries and enforces a bound on unterminated-line growth.

use crate::error::Error;

/// Default cap on an unterminated line before the framer gives up and
/// reports [`Error::OverlongFrame`].
pub const DEFAULT_MAX_FRAME: usize = 4 * 1024 * 1024;

/// Buffers bytes across chunk boundaries and yields complete lines.
///
/// A legal control-mode record is framed by a single trailing `0x0A`; the
/// framer has no notion of `%`-prefixing or command vocabulary — that's a
/// separate concern handled by the parser.
pub struct LineFramer {
    buf: Vec<u8>,
    max_frame: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME)
    }

    pub fn with_limit(max_frame: usize) -> Self {
        LineFramer {
            buf: Vec::new(),
            max_frame,
        }
    }

    /// Feed a chunk of bytes, returning any complete lines it produced (not
    /// including the trailing `\n`). Any trailing partial line is retained
    /// for the next call.
    ///
    /// If the unterminated buffer would exceed the configured limit,
    /// returns `Err(Error::OverlongFrame)` and the framer should be
    /// discarded — the connection is considered unrecoverable at that
    /// point.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            // Drop the trailing \n itself.
            let mut line = line;
            line.pop();
            lines.push(line);
        }

        if self.buf.len() > self.max_frame {
            return Err(Error::OverlongFrame);
        }

        Ok(lines)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
