//! Session bridge: one WebSocket attached to one session.
//!
//! The bridge decodes inbound frames, feeds the command pump, and serializes
//! its events back over the socket. Teardown runs when the client side
//! closes or the remote connection is lost; a bridge that was merely
//! replaced by a newer attachment exits without touching the session.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use labshell_core::{ClientFrame, CommandEvent, ServerFrame};
use labshell_session::{CommandPump, Session, SessionError, completion_candidates, lifecycle};

use crate::state::AppState;

/// Drive one attached WebSocket until it closes or is replaced.
pub async fn run(socket: WebSocket, state: AppState, session: Arc<Session>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound frames funnel through one channel so the pump, completion
    // queries and the bridge itself never contend for the socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize frame: {e}");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut detach_rx = session.attach(tx.clone());

    let mut teardown_needed = true;
    loop {
        tokio::select! {
            _ = &mut detach_rx => {
                // Replaced by a newer attachment, or torn down elsewhere
                // (explicit disconnect, transport loss, shutdown).
                teardown_needed = false;
                break;
            }
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text.into(),
                        Err(_) => continue,
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(session_id = %session.id(), "WebSocket error: {e}");
                        break;
                    }
                };

                handle_text(&state, &session, &text, &tx);
            }
        }
    }

    if teardown_needed {
        lifecycle::teardown(&state.registry, session.id()).await;
    }

    // Dropping our sender lets the forwarder drain any frames still queued
    // (teardown notices included) before the socket goes away.
    drop(tx);
    let _ = send_task.await;
}

/// Decode one inbound text frame and act on it.
///
/// A frame that does not parse is answered with an error frame; it never
/// costs the client its connection.
fn handle_text(
    state: &AppState,
    session: &Arc<Session>,
    text: &str,
    tx: &mpsc::UnboundedSender<ServerFrame>,
) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => dispatch(state, session, frame, tx),
        Err(e) => {
            warn!(session_id = %session.id(), "Invalid client frame: {e}");
            let _ = tx.send(ServerFrame::Error {
                content: format!("Invalid message: {e}"),
            });
        }
    }
}

fn dispatch(
    state: &AppState,
    session: &Arc<Session>,
    frame: ClientFrame,
    tx: &mpsc::UnboundedSender<ServerFrame>,
) {
    match frame {
        ClientFrame::Command { command } => match CommandPump::execute(session, &command) {
            Ok(events) => {
                tokio::spawn(forward_events(
                    state.clone(),
                    Arc::clone(session),
                    events,
                    tx.clone(),
                ));
            }
            Err(SessionError::Busy) => {
                let _ = tx.send(ServerFrame::Error {
                    content: "A command is already running".to_string(),
                });
            }
            Err(e) => {
                let _ = tx.send(ServerFrame::Error {
                    content: e.to_string(),
                });
            }
        },
        ClientFrame::Signal { signal } => {
            if signal == "SIGINT" {
                // Interrupt while idle is a benign race, not an error.
                if !session.interrupt() {
                    debug!(session_id = %session.id(), "Interrupt while idle ignored");
                }
            } else {
                debug!(session_id = %session.id(), %signal, "Unsupported signal ignored");
            }
        }
        ClientFrame::Completion { prefix } => {
            let session = Arc::clone(session);
            let tx = tx.clone();
            tokio::spawn(async move {
                match completion_candidates(&session, &prefix).await {
                    Ok(suggestions) => {
                        let _ = tx.send(ServerFrame::Completion { suggestions });
                    }
                    Err(e) => {
                        warn!(session_id = %session.id(), error = %e, "Completion query failed");
                    }
                }
            });
        }
    }
}

/// Serialize one command's event stream onto the wire.
///
/// Completion is implicit: the client knows the command finished when no
/// further frames arrive for it. A fatal transport failure tears the whole
/// session down after the error has been reported.
async fn forward_events(
    state: AppState,
    session: Arc<Session>,
    mut events: mpsc::Receiver<CommandEvent>,
    tx: mpsc::UnboundedSender<ServerFrame>,
) {
    let mut fatal = false;
    while let Some(event) = events.recv().await {
        let frame = match event {
            CommandEvent::Output(bytes) => ServerFrame::Output {
                content: String::from_utf8_lossy(&bytes).into_owned(),
            },
            CommandEvent::ErrorOutput(bytes) => ServerFrame::Error {
                content: String::from_utf8_lossy(&bytes).into_owned(),
            },
            CommandEvent::DirectoryChanged(path) => ServerFrame::Directory { path },
            CommandEvent::Failed(e) => {
                fatal = e.is_fatal();
                ServerFrame::Error {
                    content: e.to_string(),
                }
            }
            CommandEvent::Completed => continue,
        };
        let _ = tx.send(frame);
    }

    if fatal {
        let _ = tx.send(ServerFrame::System {
            content: "Remote connection lost".to_string(),
        });
        lifecycle::teardown(&state.registry, session.id()).await;
    }
}
