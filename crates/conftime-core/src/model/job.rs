// ── Reconciliation jobs and their results ──

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attribute::AttributeValue;
use super::family::DeviceFamily;
use crate::config::{ApplyMode, ConnectionOptions};
use crate::error::{CoreError, FaultKind};

/// Desired attribute values for one host, in input order.
pub type DesiredState = IndexMap<String, AttributeValue>;

/// One unit of work: reconcile `host` toward `desired`.
///
/// Immutable once built; this is also the queue envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub host: String,
    pub desired: DesiredState,
    pub connection: ConnectionOptions,
    pub apply: ApplyMode,
}

impl Job {
    pub fn new(
        host: impl Into<String>,
        desired: DesiredState,
        connection: ConnectionOptions,
        apply: ApplyMode,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            desired,
            connection,
            apply,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// What `Device::update` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    /// Desired state already matched the snapshot.
    Unchanged,
    /// Neither edit nor commit was requested; payloads were rendered only.
    DryRun { payloads: IndexMap<String, String> },
    /// These attributes were submitted to the device.
    Applied { attributes: Vec<String> },
}

/// Per-host fault summary carried in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl From<&CoreError> for Fault {
    fn from(err: &CoreError) -> Self {
        Self {
            kind: err.fault().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of one job, as surfaced by a dispatcher.
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub id: Uuid,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<DeviceFamily>,
    #[serde(serialize_with = "serialize_result")]
    pub result: Result<Outcome, CoreError>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl JobReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn fault(&self) -> Option<FaultKind> {
        self.result.as_ref().err().map(CoreError::fault)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished - self.started
    }
}

fn serialize_result<S>(result: &Result<Outcome, CoreError>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    #[derive(Serialize)]
    #[serde(rename_all = "lowercase")]
    enum Shape<'a> {
        Outcome(&'a Outcome),
        Fault(Fault),
    }
    match result {
        Ok(outcome) => Shape::Outcome(outcome).serialize(s),
        Err(e) => Shape::Fault(Fault::from(e)).serialize(s),
    }
}
