//! Session teardown and process shutdown.
//!
//! Teardown can be initiated by the bridge (channel closed, transport lost),
//! the disconnect route, or the shutdown sweep; any of these may race and
//! the result must be the same: the handle removed, the connection ended
//! once, the attached channel dropped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use labshell_core::{ServerFrame, SessionId};

use crate::registry::SessionRegistry;
use crate::session::Session;

/// Tear down one session. Returns whether the handle was still registered.
///
/// Idempotent: losers of a teardown race see a missing handle and do
/// nothing. The connection's own `close` is idempotent as well, so even a
/// caller holding a stale `Arc<Session>` cannot end it twice.
pub async fn teardown(registry: &SessionRegistry, id: SessionId) -> bool {
    let Some(session) = registry.remove(id).await else {
        return false;
    };
    close_session(&session).await;
    info!(session_id = %id, "Session torn down");
    true
}

async fn close_session(session: &Arc<Session>) {
    session.connection().close().await;
    session.detach();
}

/// End every live session on process shutdown.
///
/// Best-effort: connections still closing when `grace` elapses are
/// abandoned, which is acceptable on exit. The registry is empty when this
/// returns either way.
pub async fn shutdown_all(registry: &SessionRegistry, grace: Duration) {
    let sessions = registry.drain().await;
    if sessions.is_empty() {
        return;
    }
    info!(count = sessions.len(), "Shutting down live sessions");

    let sweep = async {
        for session in &sessions {
            session.send(ServerFrame::System {
                content: "Server shutting down".to_string(),
            });
            close_session(session).await;
        }
    };

    if tokio::time::timeout(grace, sweep).await.is_err() {
        warn!("Shutdown grace period elapsed with sessions still closing");
    }
}
