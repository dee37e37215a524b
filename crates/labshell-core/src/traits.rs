//! Transport seams: connector and connection traits.
//!
//! The session broker never talks SSH directly; it drives these traits.
//! `labshell-ssh` provides the real implementation, tests substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{ConnectError, TransportError};
use crate::event::CommandChunk;

/// Opaque session handle. Uuid v4: unguessable, process-unique, 36 chars
/// in string form.
pub type SessionId = Uuid;

/// Credentials for one authenticated remote connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub host: String,
    pub username: String,
    pub port: u16,
    /// PEM/OpenSSH-encoded private key material.
    pub private_key: String,
}

/// Handle to one in-flight remote command.
pub struct RemoteCommand {
    /// Output chunks; the stream ends when the remote process stream closes.
    pub chunks: mpsc::Receiver<CommandChunk>,
    /// Best-effort interrupt hook. `None` when the transport cannot signal.
    pub interrupt_tx: Option<oneshot::Sender<()>>,
}

/// One live, authenticated connection to a remote host.
///
/// Exclusively owned by a single session. `close` must be idempotent; every
/// other operation on a closed connection fails with `TransportError::Closed`.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Start one command on a fresh execution channel.
    ///
    /// # Errors
    /// `ChannelOpen` if the channel could not be allocated, `ConnectionLost`
    /// or `Closed` if the connection itself is gone.
    async fn exec(&self, command: &str) -> Result<RemoteCommand, TransportError>;

    /// End the connection. Safe to call more than once.
    async fn close(&self);
}

/// Opens authenticated remote connections.
///
/// Single attempt, no internal retry; a failed attempt leaks nothing.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// # Errors
    /// Returns `ConnectError` describing why the connection or the
    /// authentication failed.
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> Result<Arc<dyn RemoteConnection>, ConnectError>;
}
