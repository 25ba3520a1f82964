use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{debug, error};
use uuid::Uuid;

use super::{DispatchSummary, Dispatcher};
use crate::error::CoreError;
use crate::model::{Job, JobReport};
use crate::reconcile::Reconciler;
use crate::session::Connector;

/// Runs up to `threads` jobs concurrently. Reports arrive in completion
/// order.
pub struct PoolDispatcher<C: Connector> {
    reconciler: Arc<Reconciler<C>>,
    threads: usize,
}

impl<C: Connector> PoolDispatcher<C> {
    /// `threads` is clamped to at least 1.
    pub fn new(reconciler: Arc<Reconciler<C>>, threads: usize) -> Self {
        Self {
            reconciler,
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

#[async_trait]
impl<C: Connector + 'static> Dispatcher for PoolDispatcher<C> {
    async fn dispatch(&self, jobs: Vec<Job>) -> Result<DispatchSummary, CoreError> {
        let permits = Arc::new(Semaphore::new(self.threads));
        let mut tasks = FuturesUnordered::new();

        for job in jobs {
            let reconciler = Arc::clone(&self.reconciler);
            let permits = Arc::clone(&permits);
            let (id, host) = (job.id, job.host.clone());

            let handle = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| CoreError::Internal(e.to_string()))?;
                debug!(host = %job.host, "dispatching");
                Ok::<_, CoreError>(reconciler.run(&job).await)
            });
            tasks.push(async move { (id, host, handle.await) });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some((id, host, joined)) = tasks.next().await {
            let report = match joined {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => orphan_report(id, host, e),
                Err(join) => {
                    error!(%host, error = %join, "reconcile task did not complete");
                    orphan_report(id, host, CoreError::Internal(join.to_string()))
                }
            };
            reports.push(report);
        }
        Ok(DispatchSummary::Completed(reports))
    }
}

fn orphan_report(id: Uuid, host: String, err: CoreError) -> JobReport {
    let now = Utc::now();
    JobReport {
        id,
        host,
        family: None,
        result: Err(err),
        started: now,
        finished: now,
    }
}
