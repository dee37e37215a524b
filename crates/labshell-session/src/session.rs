//! Per-session state.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use labshell_core::{RemoteConnection, ServerFrame, SessionId};

/// One attached streaming channel.
///
/// Holds the outbound frame sender and a hook used to notify the owning
/// bridge when the attachment is replaced or the session is torn down.
struct Attachment {
    tx: mpsc::UnboundedSender<ServerFrame>,
    detach_tx: Option<oneshot::Sender<()>>,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if let Some(tx) = self.detach_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Live state for one brokered remote connection.
///
/// Everything here is owned by the session's own bridge and pump tasks; the
/// registry map is the only state shared across sessions.
pub struct Session {
    id: SessionId,
    connection: Arc<dyn RemoteConnection>,
    cwd: Mutex<String>,
    busy: AtomicBool,
    interrupt: Mutex<Option<oneshot::Sender<()>>>,
    attached: Mutex<Option<Attachment>>,
}

impl Session {
    pub(crate) fn new(connection: Arc<dyn RemoteConnection>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            connection,
            cwd: Mutex::new("~".to_string()),
            busy: AtomicBool::new(false),
            interrupt: Mutex::new(None),
            attached: Mutex::new(None),
        })
    }

    /// The opaque handle clients use to address this session.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn RemoteConnection> {
        &self.connection
    }

    /// Current working directory as last observed after a `cd` command.
    #[must_use]
    pub fn cwd(&self) -> String {
        self.cwd.lock().unwrap().clone()
    }

    pub(crate) fn set_cwd(&self, path: String) {
        *self.cwd.lock().unwrap() = path;
    }

    /// Whether a command is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the busy flag. Returns false if a command is already running.
    pub(crate) fn try_claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    pub(crate) fn store_interrupt(&self, tx: oneshot::Sender<()>) {
        *self.interrupt.lock().unwrap() = Some(tx);
    }

    pub(crate) fn clear_interrupt(&self) {
        self.interrupt.lock().unwrap().take();
    }

    /// Request an interrupt of the in-flight command.
    ///
    /// Returns whether a hook was present to deliver it. Interrupt while
    /// idle is a benign race, not an error.
    pub fn interrupt(&self) -> bool {
        match self.interrupt.lock().unwrap().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Attach a streaming channel, replacing any previous attachment.
    ///
    /// The returned receiver completes when this attachment is replaced by a
    /// newer one or dropped during teardown.
    pub fn attach(&self, tx: mpsc::UnboundedSender<ServerFrame>) -> oneshot::Receiver<()> {
        let (detach_tx, detach_rx) = oneshot::channel();
        let previous = self.attached.lock().unwrap().replace(Attachment {
            tx,
            detach_tx: Some(detach_tx),
        });
        if previous.is_some() {
            debug!(session_id = %self.id, "Streaming channel replaced");
        }
        detach_rx
    }

    pub(crate) fn detach(&self) {
        self.attached.lock().unwrap().take();
    }

    /// Send a frame to the attached channel, if any.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.attached
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|attachment| attachment.tx.send(frame).is_ok())
    }
}
