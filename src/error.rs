//! Crate-wide error taxonomy.

use thiserror::Error;

/// Errors surfaced by [`crate::connection::ConnectionManager`] and the host
/// store. Every variant carries a human-readable one-line description via
/// its `Display` impl.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no host profile with id {0}")]
    HostUnknown(uuid::Uuid),

    #[error("operation requires a live connection")]
    NotConnected,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("credential unavailable")]
    KeyUnavailable,

    #[error("operation timed out")]
    Timeout,

    #[error("remote exited: {0}")]
    RemoteExit(String),

    #[error("control-mode frame exceeded the size limit")]
    OverlongFrame,
}
