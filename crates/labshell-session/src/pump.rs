//! Command execution pump.
//!
//! Runs exactly one command per call and streams its lifecycle as
//! `CommandEvent`s. The busy flag is claimed synchronously, so a second
//! command while one is in flight fails fast without disturbing the first.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use labshell_core::{CommandChunk, CommandEvent, RemoteConnection, TransportError};

use crate::session::Session;

/// Event buffer per command; backpressures the remote reader.
const EVENT_BUFFER: usize = 64;

/// Session-level operation error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A command is already running on this session")]
    Busy,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Streams one remote command as an ordered event sequence.
pub struct CommandPump;

impl CommandPump {
    /// Start `command` on the session's connection.
    ///
    /// Claims the busy flag before returning; the returned receiver yields
    /// output events and ends after `Completed`. Busy is cleared when the
    /// stream finishes, on every path.
    ///
    /// # Errors
    /// `SessionError::Busy` if a command is already in flight.
    pub fn execute(
        session: &Arc<Session>,
        command: &str,
    ) -> Result<mpsc::Receiver<CommandEvent>, SessionError> {
        if !session.try_claim() {
            return Err(SessionError::Busy);
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let session = Arc::clone(session);
        let command = command.to_string();

        tokio::spawn(async move {
            run_command(&session, &command, &tx).await;
            let _ = tx.send(CommandEvent::Completed).await;
            session.clear_interrupt();
            session.release();
        });

        Ok(rx)
    }
}

async fn run_command(session: &Arc<Session>, command: &str, tx: &mpsc::Sender<CommandEvent>) {
    let mut remote = match session.connection().exec(command).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "Command failed to start");
            let _ = tx.send(CommandEvent::Failed(e)).await;
            return;
        }
    };

    if let Some(interrupt_tx) = remote.interrupt_tx.take() {
        session.store_interrupt(interrupt_tx);
    }

    while let Some(chunk) = remote.chunks.recv().await {
        let event = match chunk {
            CommandChunk::Stdout(bytes) => CommandEvent::Output(bytes),
            CommandChunk::Stderr(bytes) => CommandEvent::ErrorOutput(bytes),
            CommandChunk::Exit(status) => {
                // A non-zero exit is ordinary command output, not a broker error.
                if status != 0 {
                    debug!(session_id = %session.id(), status, "Command exited non-zero");
                }
                continue;
            }
            CommandChunk::Lost(e) => {
                warn!(session_id = %session.id(), error = %e, "Connection lost mid-command");
                let _ = tx.send(CommandEvent::Failed(e)).await;
                return;
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }

    if is_directory_change(command) {
        match query_cwd(session.connection()).await {
            Ok(path) => {
                session.set_cwd(path.clone());
                let _ = tx.send(CommandEvent::DirectoryChanged(path)).await;
            }
            Err(e) => warn!(session_id = %session.id(), error = %e, "cwd query failed"),
        }
    }
}

/// Whether the command text began with a directory-change operation.
fn is_directory_change(command: &str) -> bool {
    let trimmed = command.trim_start();
    trimmed == "cd" || trimmed.starts_with("cd ")
}

/// Run the follow-up working-directory query.
///
/// Not a user command: it bypasses the busy flag and never appears in
/// command history.
async fn query_cwd(connection: &Arc<dyn RemoteConnection>) -> Result<String, TransportError> {
    let output = collect_stdout(connection, "pwd").await?;
    Ok(String::from_utf8_lossy(&output).trim().to_string())
}

/// Remote-suggested completion candidates for a prefix.
///
/// Issued on its own channel, so it may run concurrently with an in-flight
/// command; never touches the busy flag. The query is advisory and
/// shell-specific (`compgen` on the remote's default shell).
///
/// # Errors
/// Propagates transport failures; an empty candidate set is not an error.
pub async fn completion_candidates(
    session: &Session,
    prefix: &str,
) -> Result<Vec<String>, TransportError> {
    let output = collect_stdout(session.connection(), &format!("compgen -c {prefix}")).await?;
    Ok(String::from_utf8_lossy(&output)
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect())
}

async fn collect_stdout(
    connection: &Arc<dyn RemoteConnection>,
    command: &str,
) -> Result<Vec<u8>, TransportError> {
    let mut remote = connection.exec(command).await?;
    let mut output = Vec::new();
    while let Some(chunk) = remote.chunks.recv().await {
        match chunk {
            CommandChunk::Stdout(bytes) => output.extend_from_slice(&bytes),
            CommandChunk::Lost(e) => return Err(e),
            _ => {}
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::registry::SessionRegistry;
    use crate::testing::{FakeConnection, script};

    async fn collect(mut rx: mpsc::Receiver<CommandEvent>) -> Vec<CommandEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn pwd_streams_output_then_completes() {
        let conn = FakeConnection::scripted(vec![script::stdout("/home/ubuntu\n")]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn).await;

        let events = collect(CommandPump::execute(&session, "pwd").unwrap()).await;

        assert_eq!(
            events,
            vec![
                CommandEvent::Output(Bytes::from_static(b"/home/ubuntu\n")),
                CommandEvent::Completed,
            ]
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn stream_order_is_preserved_across_stdout_and_stderr() {
        let conn = FakeConnection::scripted(vec![script::chunks(vec![
            CommandChunk::Stdout(Bytes::from_static(b"one")),
            CommandChunk::Stderr(Bytes::from_static(b"oops")),
            CommandChunk::Stdout(Bytes::from_static(b"two")),
            CommandChunk::Exit(1),
        ])]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn).await;

        let events = collect(CommandPump::execute(&session, "make").unwrap()).await;

        // Non-zero exit shows up as nothing at all: only bytes and Completed.
        assert_eq!(
            events,
            vec![
                CommandEvent::Output(Bytes::from_static(b"one")),
                CommandEvent::ErrorOutput(Bytes::from_static(b"oops")),
                CommandEvent::Output(Bytes::from_static(b"two")),
                CommandEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn second_command_while_busy_fails_without_killing_the_first() {
        let (conn, feed) = FakeConnection::held();
        let registry = SessionRegistry::new();
        let session = registry.create(conn).await;

        let mut first = CommandPump::execute(&session, "sleep 60").unwrap();
        // Wait for the pump task to reach the stream.
        feed.send(CommandChunk::Stdout(Bytes::from_static(b"tick")))
            .await
            .unwrap();
        assert_eq!(
            first.recv().await,
            Some(CommandEvent::Output(Bytes::from_static(b"tick")))
        );

        match CommandPump::execute(&session, "echo hi") {
            Err(SessionError::Busy) => {}
            other => panic!("expected Busy, got {:?}", other.map(|_| ())),
        }

        // The first command's stream is uninterrupted.
        feed.send(CommandChunk::Stdout(Bytes::from_static(b"tock")))
            .await
            .unwrap();
        assert_eq!(
            first.recv().await,
            Some(CommandEvent::Output(Bytes::from_static(b"tock")))
        );
        drop(feed);
        assert_eq!(first.recv().await, Some(CommandEvent::Completed));
        assert_eq!(first.recv().await, None);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn cd_triggers_a_trimmed_directory_event() {
        // The cd command's own stdout must not leak into the directory path.
        let conn = FakeConnection::scripted(vec![
            script::stdout("some shell banner\n"),
            script::stdout("/tmp\n"),
        ]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn.clone()).await;

        let events = collect(CommandPump::execute(&session, "cd /tmp").unwrap()).await;

        assert_eq!(
            events,
            vec![
                CommandEvent::Output(Bytes::from_static(b"some shell banner\n")),
                CommandEvent::DirectoryChanged("/tmp".into()),
                CommandEvent::Completed,
            ]
        );
        assert_eq!(session.cwd(), "/tmp");
        assert_eq!(conn.executed(), vec!["cd /tmp".to_string(), "pwd".to_string()]);
    }

    #[tokio::test]
    async fn plain_commands_do_not_query_the_directory() {
        let conn = FakeConnection::scripted(vec![script::stdout("README.md\n")]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn.clone()).await;

        let events = collect(CommandPump::execute(&session, "ls").unwrap()).await;

        assert!(!events.iter().any(|e| matches!(e, CommandEvent::DirectoryChanged(_))));
        assert_eq!(conn.executed(), vec!["ls".to_string()]);
        assert_eq!(session.cwd(), "~");
    }

    #[tokio::test]
    async fn exec_failure_emits_failed_and_clears_busy() {
        let conn = FakeConnection::scripted(vec![script::fail(TransportError::ChannelOpen(
            "no more channels".into(),
        ))]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn).await;

        let events = collect(CommandPump::execute(&session, "ls").unwrap()).await;

        assert_eq!(
            events,
            vec![
                CommandEvent::Failed(TransportError::ChannelOpen("no more channels".into())),
                CommandEvent::Completed,
            ]
        );
        assert!(!session.is_busy());

        // The session survives a channel-open failure.
        assert!(CommandPump::execute(&session, "ls").is_ok());
    }

    #[tokio::test]
    async fn mid_stream_loss_ends_with_a_fatal_failed_event() {
        let conn = FakeConnection::scripted(vec![script::chunks(vec![
            CommandChunk::Stdout(Bytes::from_static(b"partial")),
            CommandChunk::Lost(TransportError::ConnectionLost("stream ended mid-command".into())),
        ])]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn).await;

        let events = collect(CommandPump::execute(&session, "tail -f log").unwrap()).await;

        assert_eq!(
            events,
            vec![
                CommandEvent::Output(Bytes::from_static(b"partial")),
                CommandEvent::Failed(TransportError::ConnectionLost(
                    "stream ended mid-command".into()
                )),
                CommandEvent::Completed,
            ]
        );
        match &events[1] {
            CommandEvent::Failed(e) => assert!(e.is_fatal()),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn interrupt_reaches_the_in_flight_command() {
        let (conn, feed) = FakeConnection::held();
        let registry = SessionRegistry::new();
        let session = registry.create(conn.clone()).await;

        let mut rx = CommandPump::execute(&session, "sleep 60").unwrap();
        feed.send(CommandChunk::Stdout(Bytes::from_static(b"tick")))
            .await
            .unwrap();
        assert!(rx.recv().await.is_some());

        assert!(session.interrupt());
        assert!(conn.interrupt_delivered());

        // A second interrupt finds no hook and is ignored.
        assert!(!session.interrupt());
    }

    #[tokio::test]
    async fn completion_runs_concurrently_and_splits_lines() {
        let (conn, _feed) = FakeConnection::held_with_scripts(vec![script::stdout("git\ngitk\n\n")]);
        let registry = SessionRegistry::new();
        let session = registry.create(conn.clone()).await;

        // Command in flight on the held channel...
        let _rx = CommandPump::execute(&session, "sleep 60").unwrap();
        conn.wait_for("sleep 60").await;
        assert!(session.is_busy());

        // ...while the completion query uses its own channel.
        let suggestions = completion_candidates(&session, "gi").await.unwrap();
        assert_eq!(suggestions, vec!["git".to_string(), "gitk".to_string()]);
        assert!(session.is_busy());
        assert!(conn.executed().contains(&"compgen -c gi".to_string()));
    }
}
