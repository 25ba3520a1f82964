//! `conftime worker`: consume queued jobs until Ctrl-C.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use conftime_core::{AckPolicy, AmqpQueue, QueueConsumer};

use crate::cli::{GlobalOpts, WorkerArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WorkerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::resolve(global)?;
    if let Some(url) = args.amqp_url {
        config::validate_amqp_url(&url)?;
        cfg.queue.url = url;
    }
    if let Some(name) = args.queue {
        cfg.queue.name = name;
    }
    let ack: AckPolicy = args.ack.map_or(cfg.queue.ack, Into::into);

    let queue = Arc::new(AmqpQueue::connect(&cfg.queue.url, &cfg.queue.name).await?);
    info!(queue = %cfg.queue.name, %ack, "worker started");
    let consumer = QueueConsumer::new(queue, super::reconciler(&cfg, global), ack);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current job");
            on_signal.cancel();
        }
    });

    let quiet = global.quiet;
    let stats = consumer
        .run(cancel, |report| output::print_worker_report(report, quiet))
        .await?;
    output::print_worker_stats(&stats, quiet);
    Ok(())
}
