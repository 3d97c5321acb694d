//! Control-mode line framer and message parser.

pub mod framer;
pub mod message;
pub mod parser;

pub use framer::{LineFramer, DEFAULT_MAX_FRAME};
pub use message::ControlMessage;
pub use parser::{parse_record, vis_decode};

use crate::error::Error;

/// Combines a [`LineFramer`] with [`parse_record`] into the single
/// "feed bytes, get messages" entry point the connection manager's ingest
/// task drives.
pub struct ControlStream {
    framer: LineFramer,
}

impl ControlStream {
    pub fn new() -> Self {
        ControlStream {
            framer: LineFramer::new(),
        }
    }

    /// Feed a chunk of bytes from the transport, returning the control
    /// messages it completed. Propagates [`Error::OverlongFrame`] verbatim;
    /// all other malformed input becomes [`ControlMessage::Unknown`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ControlMessage>, Error> {
        let lines = self.framer.feed(chunk)?;
        Ok(lines.iter().map(|l| parse_record(l)).collect())
    }
}

impl Default for ControlStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeds_across_chunk_boundaries() {
        let mut s = ControlStream::new();
        let mut all = s.feed(b"%session-changed $1 itmux\n%out").unwrap();
        all.extend(s.feed(b"put %0 hi\n").unwrap());
        assert_eq!(
            all,
            vec![
                ControlMessage::SessionChanged {
                    session_id: "$1".to_string(),
                    session_name: "itmux".to_string(),
                },
                ControlMessage::Output {
                    pane_id: "%0".to_string(),
                    payload: b"hi".to_vec(),
                },
            ]
        );
    }
}
