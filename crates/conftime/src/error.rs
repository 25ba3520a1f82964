//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use conftime_config::ConfigError;
use conftime_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const QUEUE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("Input file not found: {path}")]
    #[diagnostic(
        code(conftime::input_not_found),
        help("Pass the desired-state file with --input (-i). Default: input.yaml")
    )]
    InputNotFound { path: String },

    #[error("Invalid input in {path}: {reason}")]
    #[diagnostic(
        code(conftime::invalid_input),
        help(
            "Expected a mapping of host -> attribute -> value, e.g.\n\
             vsrx1:\n  hostname: vsrx1\n  ntp_servers: [10.0.2.1, 10.0.2.2]"
        )
    )]
    InvalidInput { path: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(conftime::validation))]
    Validation { field: String, reason: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {host}")]
    #[diagnostic(
        code(conftime::connection_failed),
        help("Check that the device is reachable and NETCONF over SSH is enabled (port {port}).")
    )]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(conftime::auth_failed),
        help("Check --username and --key, or [connection] in the config file.")
    )]
    AuthFailed { message: String },

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(conftime::timeout),
        help("Increase the timeout with --timeout or check device responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Queue ────────────────────────────────────────────────────────
    #[error("Queue error: {message}")]
    #[diagnostic(
        code(conftime::queue),
        help("Check that RabbitMQ is running and the --amqp-url is correct.")
    )]
    Queue { message: String },

    // ── Core ─────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(conftime::core))]
    Core { fault: String, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(conftime::config_exists),
        help("Use --force to overwrite it, or edit it directly.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(conftime::config))]
    Config(Box<figment::Error>),

    #[error("failed to serialize config: {0}")]
    #[diagnostic(code(conftime::config))]
    ConfigSerialize(#[from] toml::ser::Error),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot serialize output: {0}")]
    #[diagnostic(code(conftime::json))]
    Json(#[from] serde_json::Error),

    #[error("Cannot serialize output: {0}")]
    #[diagnostic(code(conftime::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Queue { .. } => exit_code::QUEUE,
            Self::InputNotFound { .. } | Self::InvalidInput { .. } | Self::Validation { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Serialization(e) => CliError::ConfigSerialize(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let fault = err.fault().to_string();
        match err {
            CoreError::ConnectionFailed { host, reason } => CliError::ConnectionFailed {
                host,
                port: 22,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs, .. } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Queue { message } => CliError::Queue { message },
            CoreError::Input { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            other => CliError::Core {
                fault,
                message: other.to_string(),
            },
        }
    }
}
