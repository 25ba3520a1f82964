use thiserror::Error;

/// Top-level error type for the `conftime-api` crate.
///
/// Covers every failure mode of a NETCONF session: SSH connect and
/// authentication, message framing, reply parsing, and `<rpc-error>`
/// responses from the device. `conftime-core` maps these into the
/// reconciliation fault taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect or SSH handshake failed.
    #[error("Cannot connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// Public-key authentication was refused by the server.
    #[error("Authentication failed for user '{username}'")]
    Authentication { username: String },

    /// The server host key is not present in `known_hosts`.
    #[error("Host key for {host} not trusted")]
    HostKeyRejected { host: String },

    /// The private key file could not be loaded.
    #[error("Cannot load private key {path}: {reason}")]
    Key { path: String, reason: String },

    /// Low-level SSH protocol error.
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Socket or channel I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete reply arrived within the session timeout.
    #[error("Timed out after {timeout_secs}s waiting for {operation}")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    /// The peer closed the channel mid-session.
    #[error("Session closed by peer")]
    SessionClosed,

    // ── Protocol ────────────────────────────────────────────────────
    /// A message violated NETCONF end-of-message framing.
    #[error("Framing error: {0}")]
    Framing(String),

    /// A hello or rpc-reply could not be parsed.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// The device answered with one or more `<rpc-error>` elements.
    #[error("RPC error ({tag}): {message}")]
    Rpc { tag: String, message: String },
}

impl Error {
    /// Returns `true` if the session never got far enough to exchange RPCs.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Authentication { .. }
                | Self::HostKeyRejected { .. }
                | Self::Key { .. }
                | Self::Ssh(_)
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::SessionClosed | Self::Connect { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            ),
            // `lock-denied` means another session holds the datastore lock.
            Self::Rpc { tag, .. } => tag == "lock-denied" || tag == "in-use",
            _ => false,
        }
    }

    /// The NETCONF `error-tag`, if the device reported one.
    pub fn rpc_error_tag(&self) -> Option<&str> {
        match self {
            Self::Rpc { tag, .. } => Some(tag),
            _ => None,
        }
    }
}
