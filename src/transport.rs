//! The SSH transport collaborator: consumed by the connection manager, but
//! implemented by whatever SSH crate a host application chooses to link
//! in. This crate only defines the trait boundary.

use async_trait::async_trait;
use thiserror::Error;

/// Typed transport failures: connection, auth, handshake, or timeout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("operation timed out")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(String),
}

/// `credential ∈ {Password(s), PrivateKey(pemBlob, optional passphrase)}`.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    PrivateKey {
        pem: Vec<u8>,
        passphrase: Option<String>,
    },
}

/// An open, authenticated bidirectional byte channel to a remote host's
/// `tmux -CC` session.
#[async_trait]
pub trait Channel: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An authenticated SSH session, capable of opening channels that run a
/// single remote command line.
#[async_trait]
pub trait Session: Send {
    async fn open_channel(
        &mut self,
        command_line: &str,
    ) -> Result<Box<dyn Channel>, TransportError>;
    async fn disconnect(&mut self);
}

/// The SSH transport entry point a host application provides.
#[async_trait]
pub trait SshTransport: Send + Sync {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Session>, TransportError>;
    async fn authenticate(
        &self,
        session: &mut dyn Session,
        username: &str,
        credential: &Credential,
    ) -> Result<(), TransportError>;
}
