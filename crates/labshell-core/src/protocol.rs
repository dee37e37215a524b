//! JSON wire protocol between the browser terminal and the broker.
//!
//! Frames are externally tagged on `type`, matching the shapes the web
//! terminal already speaks: inbound `command` / `signal` / `completion`,
//! outbound `output` / `error` / `directory` / `system` / `completion`.

use serde::{Deserialize, Serialize};

/// Frame from the client over the streaming channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Run one shell command on the session's connection.
    Command { command: String },
    /// Deliver a signal to the in-flight command (best effort).
    Signal { signal: String },
    /// Request completion candidates for a prefix.
    ///
    /// Older clients send the prefix in a `command` field.
    Completion {
        #[serde(alias = "command")]
        prefix: String,
    },
}

/// Frame from the broker to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Command standard output.
    Output { content: String },
    /// Command standard error, or a per-command failure notice.
    Error { content: String },
    /// Working directory after a directory-changing command.
    Directory { path: String },
    /// Broker-level notice (teardown, shutdown).
    System { content: String },
    /// Completion candidates for an earlier request.
    Completion { suggestions: Vec<String> },
}
