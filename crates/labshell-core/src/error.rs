//! Error taxonomy for the session broker.
//!
//! Connect-time failures are surfaced synchronously and never create a
//! session. Transport failures are pushed asynchronously as channel events,
//! never thrown into unrelated sessions.

use thiserror::Error;

/// Failure to establish an authenticated remote connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The supplied private key could not be parsed.
    #[error("Malformed private key: {0}")]
    MalformedKey(String),
    /// The remote host rejected the credentials.
    #[error("Authentication rejected for {username}@{host}")]
    AuthRejected { host: String, username: String },
    /// The host could not be reached at the TCP level.
    #[error("Host unreachable: {0}")]
    Unreachable(String),
    /// The connection attempt did not complete in time.
    #[error("Connection to {addr} timed out")]
    Timeout { addr: String },
    /// The transport handshake or authentication exchange failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),
}

/// Failure on an established connection.
///
/// `ChannelOpen` means one command could not start; the connection itself is
/// still usable. `ConnectionLost` and `Closed` are fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Channel open failed: {0}")]
    ChannelOpen(String),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Connection already closed")]
    Closed,
}

impl TransportError {
    /// Whether this error means the whole connection is gone.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Closed)
    }
}
