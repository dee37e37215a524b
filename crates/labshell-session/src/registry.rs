//! Process-wide session registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use labshell_core::{RemoteConnection, SessionId};

use crate::session::Session;

/// Handle-keyed map of live sessions.
///
/// Owned by the server's composition root and passed down explicitly, so
/// tests can instantiate isolated registries. A handle present here always
/// maps to a connection that was live and ready when it was stored; teardown
/// removes the entry before the connection is ended.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a ready connection under a fresh handle.
    pub async fn create(&self, connection: Arc<dyn RemoteConnection>) -> Arc<Session> {
        let session = Session::new(connection);
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));
        info!(session_id = %session.id(), "Session created");
        session
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Remove a handle. Removing a missing handle is a no-op.
    pub async fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    /// Take every live session out of the registry. Shutdown only.
    pub async fn drain(&self) -> Vec<Arc<Session>> {
        self.sessions.write().await.drain().map(|(_, s)| s).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
