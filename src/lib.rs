//! `itmux-core`: control-mode framing, VT emulation, and session state for
//! an SSH-attached `tmux -CC` client.
//!
//! The six components mirror a connection's data flow: raw transport bytes
//! enter [`control`] (C1), pane output is rendered by [`term`] (C3), layout
//! strings are parsed by [`layout`] (C2) and applied to [`registry`] (C4),
//! [`connection`] (C5) owns the per-host state machine and ingest task, and
//! [`snapshot`] (C6) is the read-only view the presentation layer polls.

pub mod connection;
pub mod control;
pub mod error;
pub mod host;
pub mod layout;
pub mod registry;
pub mod snapshot;
pub mod term;
pub mod transport;

pub use error::Error;
