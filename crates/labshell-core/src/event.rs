//! Typed events for one remote command execution.

use bytes::Bytes;

use crate::error::TransportError;

/// Raw chunk read from a running remote command's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandChunk {
    /// Standard-output bytes, in emission order.
    Stdout(Bytes),
    /// Standard-error bytes, in emission order.
    Stderr(Bytes),
    /// Remote exit status. Reported, never treated as an error here.
    Exit(u32),
    /// The transport failed mid-stream. Always the final chunk.
    Lost(TransportError),
}

/// Event produced by the command pump for one command.
///
/// Ordering within each of stdout/stderr is preserved; ordering between the
/// two streams is best-effort. `Completed` is always the final event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// Chunk of standard output.
    Output(Bytes),
    /// Chunk of standard error.
    ErrorOutput(Bytes),
    /// Working directory after a directory-changing command finished.
    DirectoryChanged(String),
    /// The command could not run; carries the transport-level cause.
    Failed(TransportError),
    /// The remote stream closed and the session is idle again.
    Completed,
}
