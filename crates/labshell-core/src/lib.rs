//! Core abstractions for the labshell session broker.
//!
//! This crate provides the shared vocabulary:
//! - `CommandEvent` - Typed event stream for one remote command
//! - `ClientFrame` / `ServerFrame` - JSON wire protocol
//! - `RemoteConnection` / `RemoteConnector` - Transport seams
//! - Error taxonomy (`ConnectError`, `TransportError`)

pub mod error;
pub mod event;
pub mod protocol;
pub mod traits;

pub use error::{ConnectError, TransportError};
pub use event::{CommandChunk, CommandEvent};
pub use protocol::{ClientFrame, ServerFrame};
pub use traits::{ConnectParams, RemoteCommand, RemoteConnection, RemoteConnector, SessionId};
