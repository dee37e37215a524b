//! Shared application state.

use std::sync::Arc;

use labshell_core::RemoteConnector;
use labshell_session::SessionRegistry;

/// State shared across handlers.
///
/// The registry is an owned object created here, not a module-level global,
/// so tests can build isolated instances with their own connector.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub connector: Arc<dyn RemoteConnector>,
}

impl AppState {
    #[must_use]
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            connector,
        }
    }
}
