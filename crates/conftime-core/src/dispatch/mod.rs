// ── Job dispatch ──
//
// One `Dispatcher` interface, three strategies: run jobs in input order,
// run them on a bounded pool of tasks, or publish them to a queue for
// workers to pick up.

mod pool;
pub mod queue;
mod sequential;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;
use crate::model::{Job, JobReport};

pub use pool::PoolDispatcher;
pub use queue::{AckPolicy, AmqpQueue, Delivery, JobQueue, MemoryQueue, QueueConsumer, QueueProducer, WorkerStats};
pub use sequential::SequentialDispatcher;

/// Dispatch strategy selected by configuration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Sequential,
    Pool,
    Queue,
}

/// What a dispatcher did with a batch.
#[derive(Debug)]
pub enum DispatchSummary {
    /// Jobs ran in-process; one report per job.
    Completed(Vec<JobReport>),
    /// Jobs were handed to a queue; this many were published.
    Published(usize),
}

impl DispatchSummary {
    pub fn reports(&self) -> &[JobReport] {
        match self {
            Self::Completed(reports) => reports,
            Self::Published(_) => &[],
        }
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Per-job faults are carried in the reports. An `Err` here means the
    /// dispatcher itself failed (e.g. the queue broker is unreachable).
    async fn dispatch(&self, jobs: Vec<Job>) -> Result<DispatchSummary, CoreError>;
}
