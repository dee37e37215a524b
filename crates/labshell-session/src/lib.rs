//! Session brokering for labshell.
//!
//! Provides:
//! - `Session` - Per-connection state (cwd, busy flag, attached channel)
//! - `SessionRegistry` - Handle-keyed map owned by the composition root
//! - `CommandPump` - One command in, ordered `CommandEvent` stream out
//! - `lifecycle` - Idempotent teardown and process-shutdown sweep

pub mod lifecycle;
pub mod pump;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use pump::{CommandPump, SessionError, completion_candidates};
pub use registry::SessionRegistry;
pub use session::Session;
