// ── Core error types ──
//
// Reconciliation faults from conftime-core. Consumers never see raw SSH
// or framing errors: the `From<conftime_api::Error>` impl translates
// session-layer failures into connection or transaction faults.

use strum::Display;
use thiserror::Error;

/// Coarse classification used for per-host reporting and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FaultKind {
    Connection,
    UnsupportedFamily,
    Query,
    Transaction,
    Render,
    Queue,
    Input,
    Internal,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection faults ────────────────────────────────────────────
    #[error("Cannot connect to {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session timed out after {timeout_secs}s during {operation}")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    #[error("Session closed by device")]
    SessionClosed,

    // ── Family faults ────────────────────────────────────────────────
    #[error("Unsupported device family: {family}")]
    UnsupportedFamily { family: String },

    // ── Attribute / query faults ─────────────────────────────────────
    #[error("Unknown attribute '{name}' for {family}")]
    UnknownAttribute { name: String, family: String },

    #[error("Attribute '{name}' is read-only")]
    ReadOnlyAttribute { name: String },

    #[error("Query '{query}' for scalar attribute '{attribute}' matched {count} nodes")]
    MultipleMatch {
        attribute: String,
        query: String,
        count: usize,
    },

    #[error("Invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    #[error("Cannot parse {document} document: {reason}")]
    InvalidDocument { document: String, reason: String },

    #[error("Cannot fetch {document} document: {reason}")]
    DocumentUnavailable { document: String, reason: String },

    // ── Transaction faults ───────────────────────────────────────────
    #[error("Transaction rejected during {stage}: {message}")]
    Transaction {
        stage: String,
        /// The NETCONF error-tag, if the device reported one.
        tag: Option<String>,
        message: String,
    },

    #[error("Cannot render payload for '{attribute}': {reason}")]
    Render { attribute: String, reason: String },

    // ── Dispatch faults ──────────────────────────────────────────────
    #[error("Queue error: {message}")]
    Queue { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    Input { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Map the error into the fault taxonomy used by dispatch reporting.
    pub fn fault(&self) -> FaultKind {
        match self {
            Self::ConnectionFailed { .. }
            | Self::AuthenticationFailed { .. }
            | Self::Timeout { .. }
            | Self::SessionClosed => FaultKind::Connection,
            Self::UnsupportedFamily { .. } => FaultKind::UnsupportedFamily,
            Self::MultipleMatch { .. }
            | Self::InvalidQuery { .. }
            | Self::InvalidDocument { .. }
            | Self::DocumentUnavailable { .. } => FaultKind::Query,
            Self::Transaction { .. } => FaultKind::Transaction,
            Self::Render { .. } => FaultKind::Render,
            Self::Queue { .. } | Self::Serialization(_) => FaultKind::Queue,
            Self::UnknownAttribute { .. }
            | Self::ReadOnlyAttribute { .. }
            | Self::Input { .. } => FaultKind::Input,
            Self::Internal(_) => FaultKind::Internal,
        }
    }

    /// Wrap a session error raised while running a transaction stage.
    pub(crate) fn transaction(stage: &str, err: conftime_api::Error) -> Self {
        match err {
            conftime_api::Error::Rpc { tag, message } => Self::Transaction {
                stage: stage.into(),
                tag: Some(tag),
                message,
            },
            other if other.is_connection() || other.is_transient() => other.into(),
            other => Self::Transaction {
                stage: stage.into(),
                tag: None,
                message: other.to_string(),
            },
        }
    }

    /// Wrap a session error raised while fetching a source document.
    pub(crate) fn document(document: &str, err: conftime_api::Error) -> Self {
        match err {
            conftime_api::Error::Rpc { tag, message } => Self::DocumentUnavailable {
                document: document.into(),
                reason: format!("{tag}: {message}"),
            },
            other => other.into(),
        }
    }
}

// ── Conversion from session-layer errors ─────────────────────────────

impl From<conftime_api::Error> for CoreError {
    fn from(err: conftime_api::Error) -> Self {
        match err {
            conftime_api::Error::Connect { host, port, reason } => CoreError::ConnectionFailed {
                host: format!("{host}:{port}"),
                reason,
            },
            conftime_api::Error::Authentication { username } => CoreError::AuthenticationFailed {
                message: format!("public key rejected for user '{username}'"),
            },
            conftime_api::Error::HostKeyRejected { host } => CoreError::ConnectionFailed {
                host,
                reason: "host key not trusted (known_hosts)".into(),
            },
            conftime_api::Error::Key { path, reason } => CoreError::AuthenticationFailed {
                message: format!("cannot load key {path}: {reason}"),
            },
            conftime_api::Error::Ssh(e) => CoreError::ConnectionFailed {
                host: String::new(),
                reason: format!("SSH error: {e}"),
            },
            conftime_api::Error::Io(e) => CoreError::ConnectionFailed {
                host: String::new(),
                reason: format!("I/O error: {e}"),
            },
            conftime_api::Error::Timeout {
                operation,
                timeout_secs,
            } => CoreError::Timeout {
                operation: operation.into(),
                timeout_secs,
            },
            conftime_api::Error::SessionClosed => CoreError::SessionClosed,
            conftime_api::Error::Framing(msg) | conftime_api::Error::MalformedReply(msg) => {
                CoreError::InvalidDocument {
                    document: "reply".into(),
                    reason: msg,
                }
            }
            conftime_api::Error::Rpc { tag, message } => CoreError::Transaction {
                stage: "rpc".into(),
                tag: Some(tag),
                message,
            },
        }
    }
}
