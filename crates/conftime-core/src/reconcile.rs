// ── One reconciliation run per job ──
//
// connect → detect → populate → set desired → report → update → close.
// Every fault is caught here and carried in the `JobReport`; a failing
// host never aborts its batch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::detect::detect;
use crate::device::{AttributeMap, Device};
use crate::error::{CoreError, FaultKind};
use crate::model::{DeviceFamily, Job, JobReport, Outcome};
use crate::render::Renderer;
use crate::session::{Connector, Session};

/// Receives each device's attribute report before its transaction starts.
pub trait ReportSink: Send + Sync {
    fn device_state(&self, host: &str, family: DeviceFamily, attributes: &AttributeMap);
}

/// Discards reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReport;

impl ReportSink for NoReport {
    fn device_state(&self, _host: &str, _family: DeviceFamily, _attributes: &AttributeMap) {}
}

/// Runs jobs against devices reached through `C`.
pub struct Reconciler<C: Connector> {
    connector: C,
    renderer: Arc<dyn Renderer>,
    sink: Arc<dyn ReportSink>,
}

impl<C: Connector> Reconciler<C> {
    pub fn new(connector: C, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            connector,
            renderer,
            sink: Arc::new(NoReport),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run one job to completion. Never fails: faults land in the report.
    pub async fn run(&self, job: &Job) -> JobReport {
        let started = Utc::now();
        let mut family = None;
        let result = self.reconcile(job, &mut family).await;

        match &result {
            Ok(outcome) => info!(host = %job.host, job = %job.id, ?outcome, "job finished"),
            Err(e) => match e.fault() {
                FaultKind::Connection | FaultKind::UnsupportedFamily => {
                    warn!(host = %job.host, job = %job.id, fault = %e.fault(), "skipping host: {e}");
                }
                _ => error!(host = %job.host, job = %job.id, fault = %e.fault(), "job failed: {e}"),
            },
        }

        JobReport {
            id: job.id,
            host: job.host.clone(),
            family,
            result,
            started,
            finished: Utc::now(),
        }
    }

    async fn reconcile(
        &self,
        job: &Job,
        family_out: &mut Option<DeviceFamily>,
    ) -> Result<Outcome, CoreError> {
        let mut session = self.connector.connect(&job.host, &job.connection).await?;

        let family = match detect(session.capabilities()) {
            Ok(family) => family,
            Err(e) => {
                if let Err(close) = session.close().await {
                    warn!(host = %job.host, error = %close, "session close failed");
                }
                return Err(e);
            }
        };
        *family_out = Some(family);

        let mut device = Device::new(job.host.clone(), session, family).await?;
        let result = self.drive(&mut device, job).await;
        if let Err(e) = device.close().await {
            warn!(host = %job.host, error = %e, "session close failed");
        }
        result
    }

    async fn drive<S: Session>(
        &self,
        device: &mut Device<S>,
        job: &Job,
    ) -> Result<Outcome, CoreError> {
        for (name, value) in &job.desired {
            device.set(name, value.clone())?;
        }

        let report = device.report().await?;
        self.sink.device_state(device.host(), device.family(), &report);

        device.update(self.renderer.as_ref(), job.apply).await
    }
}
