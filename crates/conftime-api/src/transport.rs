// SSH transport for the `netconf` subsystem
//
// Opens an SSH session with public-key auth, optionally verifies the
// server key against the user's `known_hosts`, and returns a byte stream
// bound to the `netconf` subsystem channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use tracing::{debug, warn};

use crate::error::Error;

/// Everything needed to reach one device.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_path: PathBuf,
    /// Check the server key against `~/.ssh/known_hosts`.
    pub verify_hostkey: bool,
    /// Applied to connect, handshake, and every RPC round trip.
    pub timeout: Duration,
}

/// Host-key policy handed to `russh`.
pub(crate) struct HostKeyPolicy {
    host: String,
    port: u16,
    verify: bool,
}

impl client::Handler for HostKeyPolicy {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        if !self.verify {
            return Ok(true);
        }
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(host = %self.host, "server key not found in known_hosts");
                Ok(false)
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "known_hosts check failed");
                Ok(false)
            }
        }
    }
}

/// Keeps the SSH connection alive for as long as the NETCONF channel is used.
pub struct SshTransport {
    handle: client::Handle<HostKeyPolicy>,
}

impl SshTransport {
    /// Tear down the SSH connection.
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

/// Connect, authenticate, and open the `netconf` subsystem.
pub(crate) async fn open(
    params: &ConnectParams,
) -> Result<(SshTransport, russh::ChannelStream<client::Msg>), Error> {
    let key = load_secret_key(&params.key_path, None).map_err(|e| Error::Key {
        path: params.key_path.display().to_string(),
        reason: e.to_string(),
    })?;

    let policy = HostKeyPolicy {
        host: params.host.clone(),
        port: params.port,
        verify: params.verify_hostkey,
    };
    let config = Arc::new(client::Config::default());

    debug!(host = %params.host, port = params.port, "opening SSH session");
    let connecting = client::connect(config, (params.host.as_str(), params.port), policy);
    let mut handle = with_timeout(params.timeout, "ssh connect", connecting)
        .await?
        .map_err(|e| match e {
            russh::Error::UnknownKey => Error::HostKeyRejected {
                host: params.host.clone(),
            },
            other => Error::Connect {
                host: params.host.clone(),
                port: params.port,
                reason: other.to_string(),
            },
        })?;

    let hash_alg = with_timeout(
        params.timeout,
        "key exchange",
        handle.best_supported_rsa_hash(),
    )
    .await??
    .flatten();
    let auth = with_timeout(
        params.timeout,
        "authentication",
        handle.authenticate_publickey(
            params.username.clone(),
            PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
        ),
    )
    .await??;
    if !auth.success() {
        return Err(Error::Authentication {
            username: params.username.clone(),
        });
    }
    debug!(host = %params.host, user = %params.username, "authenticated");

    let channel = with_timeout(params.timeout, "channel open", handle.channel_open_session())
        .await??;
    with_timeout(
        params.timeout,
        "netconf subsystem",
        channel.request_subsystem(true, "netconf"),
    )
    .await??;

    Ok((SshTransport { handle }, channel.into_stream()))
}

async fn with_timeout<T>(
    timeout: Duration,
    operation: &'static str,
    fut: impl Future<Output = T>,
) -> Result<T, Error> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout {
            operation,
            timeout_secs: timeout.as_secs(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_step_times_out_with_its_name() {
        let err = with_timeout(
            Duration::from_secs(3),
            "netconf subsystem",
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                operation: "netconf subsystem",
                timeout_secs: 3,
            }
        ));
    }

    #[tokio::test]
    async fn prompt_step_passes_its_output_through() {
        let out = with_timeout(Duration::from_secs(3), "channel open", async { 7 })
            .await
            .unwrap();
        assert_eq!(out, 7);
    }
}
