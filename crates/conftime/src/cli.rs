//! Clap derive structures for the `conftime` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// conftime -- declarative NETCONF configuration for network devices
#[derive(Debug, Parser)]
#[command(
    name = "conftime",
    version,
    about = "Reconcile network device configuration over NETCONF",
    long_about = "Reads a desired state (host -> attribute -> value) and pushes only the\n\
        differences to each device inside a locked edit-config + commit.\n\n\
        Jobs run sequentially, on a bounded pool, or through a RabbitMQ queue\n\
        consumed by `conftime worker` processes.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: platform config dir)
    #[arg(long, env = "CONFTIME_CONFIG", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// NETCONF-over-SSH port
    #[arg(long, short = 'p', global = true)]
    pub port: Option<u16>,

    /// SSH username
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    /// Private key for public-key authentication
    #[arg(long, short = 'k', global = true, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// Check device host keys against ~/.ssh/known_hosts
    #[arg(long, global = true)]
    pub verify_hostkey: bool,

    /// Per-RPC timeout in seconds
    #[arg(long, short = 't', global = true)]
    pub timeout: Option<u64>,

    /// Directory of <family>/<attribute>.j2 template overrides
    #[arg(long, global = true, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Output format for device reports
    #[arg(
        long,
        short = 'o',
        env = "CONFTIME_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// One host after another, in input order
    Sequential,
    /// Bounded number of hosts in flight
    Pool,
    /// Publish jobs to RabbitMQ for workers
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AckArg {
    /// Acknowledge after a successful run; dead-letter failures
    AfterRun,
    /// Acknowledge as soon as a message is received
    OnReceipt,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile devices against a desired-state file
    #[command(alias = "a")]
    Apply(ApplyArgs),

    /// Consume jobs from the queue until interrupted
    #[command(alias = "w")]
    Worker(WorkerArgs),

    /// Manage the conftime configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── apply ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Desired state: YAML or JSON mapping of host -> attribute -> value
    #[arg(long, short = 'i', default_value = "input.yaml", value_name = "FILE")]
    pub input: PathBuf,

    /// Dispatch strategy (default: from config)
    #[arg(long, short = 's')]
    pub strategy: Option<StrategyArg>,

    /// Concurrent hosts for the pool strategy (implies --strategy pool)
    #[arg(long, conflicts_with = "amqp_url")]
    pub threads: Option<usize>,

    /// RabbitMQ URL (implies --strategy queue)
    #[arg(long, value_name = "URL")]
    pub amqp_url: Option<String>,

    /// Render payloads without editing or committing
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Edit the candidate datastore but skip commit
    #[arg(long, conflicts_with = "dry_run")]
    pub no_commit: bool,
}

// ── worker ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// RabbitMQ URL (default: from config)
    #[arg(long, value_name = "URL")]
    pub amqp_url: Option<String>,

    /// Queue name (default: from config)
    #[arg(long)]
    pub queue: Option<String>,

    /// When to acknowledge messages (default: from config)
    #[arg(long)]
    pub ack: Option<AckArg>,
}

// ── config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Display the resolved configuration (file + env + flags)
    Show,

    /// Print the config file location
    Path,
}

// ── completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
