//! Subcommand handlers.

pub mod apply;
pub mod config_cmd;
pub mod worker;

use std::sync::Arc;

use conftime_core::{AckPolicy, NetconfConnector, Reconciler, Strategy, TemplateRenderer};

use crate::cli::{AckArg, GlobalOpts, StrategyArg};
use crate::config::Config;
use crate::output::StdoutReport;

/// Reconciler over NETCONF/SSH that prints device reports to stdout.
pub(crate) fn reconciler(cfg: &Config, global: &GlobalOpts) -> Arc<Reconciler<NetconfConnector>> {
    let renderer = Arc::new(TemplateRenderer::new(cfg.templates.dir.clone()));
    let sink = Arc::new(StdoutReport::new(global.output, global.quiet));
    Arc::new(Reconciler::new(NetconfConnector, renderer).with_sink(sink))
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => Self::Sequential,
            StrategyArg::Pool => Self::Pool,
            StrategyArg::Queue => Self::Queue,
        }
    }
}

impl From<AckArg> for AckPolicy {
    fn from(arg: AckArg) -> Self {
        match arg {
            AckArg::AfterRun => Self::AfterRun,
            AckArg::OnReceipt => Self::OnReceipt,
        }
    }
}
