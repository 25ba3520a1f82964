//! `conftime apply`: build one job per host and dispatch the batch.

use std::sync::Arc;

use tracing::{debug, info};

use conftime_core::{
    AmqpQueue, ApplyMode, DispatchSummary, Dispatcher, Job, PoolDispatcher, QueueProducer,
    SequentialDispatcher, Strategy,
};

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::{input, output};

pub async fn handle(args: ApplyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::resolve(global)?;
    let strategy = select_strategy(&args, &mut cfg)?;
    let mode = apply_mode(&args);

    let inventory = input::load(&args.input)?;
    if inventory.is_empty() {
        info!(input = %args.input.display(), "no hosts in input");
        return Ok(());
    }

    let connection = cfg.connection_options();
    let jobs: Vec<Job> = inventory
        .into_iter()
        .map(|(host, desired)| Job::new(host, desired, connection.clone(), mode))
        .collect();
    debug!(jobs = jobs.len(), %strategy, ?mode, "dispatching batch");

    let summary = match strategy {
        Strategy::Sequential => {
            SequentialDispatcher::new(super::reconciler(&cfg, global))
                .dispatch(jobs)
                .await?
        }
        Strategy::Pool => {
            PoolDispatcher::new(super::reconciler(&cfg, global), cfg.dispatch.threads)
                .dispatch(jobs)
                .await?
        }
        Strategy::Queue => {
            let queue = AmqpQueue::connect(&cfg.queue.url, &cfg.queue.name).await?;
            QueueProducer::new(Arc::new(queue)).dispatch(jobs).await?
        }
    };

    match summary {
        DispatchSummary::Completed(reports) => {
            output::print_payloads(&reports, global.quiet);
            output::print_summary(&reports, output::should_color(global.color), global.quiet);
        }
        DispatchSummary::Published(count) => {
            if !global.quiet {
                eprintln!("Published {count} job(s) to queue '{}'", cfg.queue.name);
            }
        }
    }
    Ok(())
}

/// `--strategy` wins; otherwise `--amqp-url` implies queue and `--threads`
/// implies pool; otherwise the configured strategy.
fn select_strategy(args: &ApplyArgs, cfg: &mut Config) -> Result<Strategy, CliError> {
    if let Some(ref url) = args.amqp_url {
        config::validate_amqp_url(url)?;
        cfg.queue.url.clone_from(url);
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err(CliError::Validation {
                field: "threads".into(),
                reason: "must be at least 1".into(),
            });
        }
        cfg.dispatch.threads = threads;
    }

    Ok(match (args.strategy, &args.amqp_url, args.threads) {
        (Some(s), _, _) => s.into(),
        (None, Some(_), _) => Strategy::Queue,
        (None, None, Some(_)) => Strategy::Pool,
        (None, None, None) => cfg.dispatch.strategy,
    })
}

fn apply_mode(args: &ApplyArgs) -> ApplyMode {
    if args.dry_run {
        ApplyMode::DRY_RUN
    } else {
        ApplyMode {
            edit: true,
            commit: !args.no_commit,
        }
    }
}
