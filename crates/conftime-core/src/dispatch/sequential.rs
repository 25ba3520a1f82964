use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{DispatchSummary, Dispatcher};
use crate::error::CoreError;
use crate::model::Job;
use crate::reconcile::Reconciler;
use crate::session::Connector;

/// Runs jobs one after another in input order.
pub struct SequentialDispatcher<C: Connector> {
    reconciler: Arc<Reconciler<C>>,
}

impl<C: Connector> SequentialDispatcher<C> {
    pub fn new(reconciler: Arc<Reconciler<C>>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl<C: Connector + 'static> Dispatcher for SequentialDispatcher<C> {
    async fn dispatch(&self, jobs: Vec<Job>) -> Result<DispatchSummary, CoreError> {
        let mut reports = Vec::with_capacity(jobs.len());
        for job in &jobs {
            debug!(host = %job.host, "dispatching");
            reports.push(self.reconciler.run(job).await);
        }
        Ok(DispatchSummary::Completed(reports))
    }
}
