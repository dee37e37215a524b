//! Authenticated connection establishment.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use tracing::{debug, info, warn};

use labshell_core::{ConnectError, ConnectParams, RemoteConnection, RemoteConnector};

use crate::connection::SshConnection;

/// Opens one publickey-authenticated SSH connection per call.
///
/// The connection handle is only returned once the remote side has completed
/// the handshake and accepted the key; a half-open connection is disconnected
/// before the error is surfaced. Retries are a caller concern.
#[derive(Debug, Clone)]
pub struct SshConnector {
    /// Upper bound on the whole connect-and-handshake phase.
    pub connect_timeout: Duration,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Client handler for russh callbacks.
///
/// Training hosts are ephemeral VMs with freshly generated host keys, so
/// there is no stable known_hosts set to pin against.
pub(crate) struct LabHostHandler;

#[async_trait]
impl client::Handler for LabHostHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        warn!("Accepting remote host key without verification");
        Ok(true)
    }
}

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> Result<Arc<dyn RemoteConnection>, ConnectError> {
        let key = russh_keys::decode_secret_key(&params.private_key, None)
            .map_err(|e| ConnectError::MalformedKey(e.to_string()))?;

        let config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..client::Config::default()
        });

        let addr = format!("{}:{}", params.host, params.port);
        debug!(addr = %addr, username = %params.username, "Opening SSH connection");

        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, &addr, LabHostHandler),
        )
        .await
        .map_err(|_| ConnectError::Timeout { addr: addr.clone() })?
        .map_err(|e| match e {
            russh::Error::IO(io) => ConnectError::Unreachable(io.to_string()),
            other => ConnectError::Handshake(other.to_string()),
        })?;

        let authenticated = handle
            .authenticate_publickey(&params.username, Arc::new(key))
            .await
            .map_err(|e| ConnectError::Handshake(e.to_string()))?;

        if !authenticated {
            // Do not leak the half-open connection.
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "auth rejected", "en")
                .await;
            return Err(ConnectError::AuthRejected {
                host: params.host.clone(),
                username: params.username.clone(),
            });
        }

        info!(addr = %addr, username = %params.username, "SSH connection ready");
        Ok(Arc::new(SshConnection::new(handle)))
    }
}
