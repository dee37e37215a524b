//! SSH transport for the labshell session broker.
//!
//! Provides:
//! - `SshConnector` - `RemoteConnector` over russh publickey auth
//! - `SshConnection` - `RemoteConnection` multiplexing exec channels

pub mod connection;
pub mod connector;

pub use connection::SshConnection;
pub use connector::SshConnector;
