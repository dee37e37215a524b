//! Scripted fake transport for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use labshell_core::{CommandChunk, RemoteCommand, RemoteConnection, TransportError};

/// Pre-programmed outcome for one exec call.
pub(crate) enum Script {
    Chunks(Vec<CommandChunk>),
    Fail(TransportError),
}

/// Script constructors.
pub(crate) mod script {
    use super::{Bytes, CommandChunk, Script, TransportError};

    pub(crate) fn stdout(s: &str) -> Script {
        Script::Chunks(vec![CommandChunk::Stdout(Bytes::copy_from_slice(
            s.as_bytes(),
        ))])
    }

    pub(crate) fn chunks(chunks: Vec<CommandChunk>) -> Script {
        Script::Chunks(chunks)
    }

    pub(crate) fn fail(err: TransportError) -> Script {
        Script::Fail(err)
    }
}

/// Fake `RemoteConnection` that replays scripts in exec order.
///
/// An optional "held" stream is handed to the first exec call so a test can
/// keep a command in flight while driving other operations.
pub(crate) struct FakeConnection {
    held: Mutex<Option<mpsc::Receiver<CommandChunk>>>,
    scripts: Mutex<VecDeque<Script>>,
    executed: Mutex<Vec<String>>,
    interrupts: Mutex<Vec<oneshot::Receiver<()>>>,
    close_count: AtomicUsize,
}

impl FakeConnection {
    /// Connection whose every command produces an empty stream.
    pub(crate) fn quiet() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub(crate) fn scripted(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            held: Mutex::new(None),
            scripts: Mutex::new(scripts.into()),
            executed: Mutex::new(Vec::new()),
            interrupts: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
        })
    }

    /// Connection whose first exec streams from the returned sender.
    pub(crate) fn held() -> (Arc<Self>, mpsc::Sender<CommandChunk>) {
        Self::held_with_scripts(Vec::new())
    }

    pub(crate) fn held_with_scripts(
        scripts: Vec<Script>,
    ) -> (Arc<Self>, mpsc::Sender<CommandChunk>) {
        let (tx, rx) = mpsc::channel(16);
        let conn = Self::scripted(scripts);
        *conn.held.lock().unwrap() = Some(rx);
        (conn, tx)
    }

    /// Commands seen so far, in exec order.
    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Busy-wait (yielding) until `command` has reached exec.
    pub(crate) async fn wait_for(&self, command: &str) {
        while !self.executed().iter().any(|c| c == command) {
            tokio::task::yield_now().await;
        }
    }

    /// Whether any interrupt hook has fired.
    pub(crate) fn interrupt_delivered(&self) -> bool {
        self.interrupts
            .lock()
            .unwrap()
            .iter_mut()
            .any(|rx| rx.try_recv().is_ok())
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn new_interrupt(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.interrupts.lock().unwrap().push(rx);
        tx
    }
}

#[async_trait]
impl RemoteConnection for FakeConnection {
    async fn exec(&self, command: &str) -> Result<RemoteCommand, TransportError> {
        if let Some(chunks) = self.held.lock().unwrap().take() {
            self.executed.lock().unwrap().push(command.to_string());
            return Ok(RemoteCommand {
                chunks,
                interrupt_tx: Some(self.new_interrupt()),
            });
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Chunks(Vec::new()));
        self.executed.lock().unwrap().push(command.to_string());

        match script {
            Script::Fail(err) => Err(err),
            Script::Chunks(chunks) => {
                let (tx, rx) = mpsc::channel(chunks.len().max(1));
                for chunk in chunks {
                    tx.try_send(chunk).expect("script buffer sized to fit");
                }
                Ok(RemoteCommand {
                    chunks: rx,
                    interrupt_tx: Some(self.new_interrupt()),
                })
            }
        }
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}
