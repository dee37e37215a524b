//! HTTP/WebSocket surface for the labshell session broker.
//!
//! Provides:
//! - `AppState` - Composition root state (registry + connector)
//! - `router` - Connect/disconnect routes and the WebSocket bridge
//! - `ServerConfig` - Environment-driven listener configuration

pub mod bridge;
pub mod config;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use routes::router;
pub use state::AppState;
