//! One live SSH connection, multiplexing exec channels.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use russh::{ChannelMsg, Disconnect, Sig, client};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, trace, warn};

use labshell_core::{CommandChunk, RemoteCommand, RemoteConnection, TransportError};

use crate::connector::LabHostHandler;

/// Chunk buffer per in-flight command; backpressures the channel reader.
const CHUNK_BUFFER: usize = 64;

/// A ready, authenticated SSH connection.
///
/// Each `exec` opens a dedicated session channel, so a completion query can
/// run while a command is still streaming. `close` is idempotent.
pub struct SshConnection {
    handle: Mutex<client::Handle<LabHostHandler>>,
    closed: AtomicBool,
}

impl SshConnection {
    pub(crate) fn new(handle: client::Handle<LabHostHandler>) -> Self {
        Self {
            handle: Mutex::new(handle),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RemoteConnection for SshConnection {
    async fn exec(&self, command: &str) -> Result<RemoteCommand, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let mut channel = {
            let handle = self.handle.lock().await;
            match handle.channel_open_session().await {
                Ok(channel) => channel,
                Err(e) if handle.is_closed() => {
                    return Err(TransportError::ConnectionLost(e.to_string()));
                }
                Err(e) => return Err(TransportError::ChannelOpen(e.to_string())),
            }
        };

        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::ChannelOpen(e.to_string()))?;
        debug!(command, "Exec channel opened");

        let (chunk_tx, chunks) = mpsc::channel(CHUNK_BUFFER);
        let (interrupt_tx, mut interrupt_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut interruptible = true;
            let mut finished = false;
            loop {
                tokio::select! {
                    msg = channel.wait() => match msg {
                        Some(ChannelMsg::Data { ref data }) => {
                            let chunk = CommandChunk::Stdout(Bytes::copy_from_slice(data));
                            if chunk_tx.send(chunk).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { ref data, ext: 1 }) => {
                            let chunk = CommandChunk::Stderr(Bytes::copy_from_slice(data));
                            if chunk_tx.send(chunk).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            finished = true;
                            let _ = chunk_tx.send(CommandChunk::Exit(exit_status)).await;
                        }
                        Some(ChannelMsg::ExitSignal { .. }) => finished = true,
                        Some(ChannelMsg::Eof | ChannelMsg::Close) => break,
                        None => {
                            // The stream ended without a close handshake, so
                            // the peer vanished mid-command.
                            if !finished {
                                let _ = chunk_tx
                                    .send(CommandChunk::Lost(TransportError::ConnectionLost(
                                        "stream ended mid-command".to_string(),
                                    )))
                                    .await;
                            }
                            break;
                        }
                        Some(other) => trace!(?other, "Ignoring channel message"),
                    },
                    _ = &mut interrupt_rx, if interruptible => {
                        interruptible = false;
                        // Advisory only; not every sshd honors signal requests.
                        if let Err(e) = channel.signal(Sig::INT).await {
                            warn!(error = %e, "Failed to deliver SIGINT to remote command");
                        }
                    }
                }
            }
        });

        Ok(RemoteCommand {
            chunks,
            interrupt_tx: Some(interrupt_tx),
        })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = self.handle.lock().await;
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
        {
            debug!(error = %e, "Disconnect after connection already dropped");
        }
    }
}
