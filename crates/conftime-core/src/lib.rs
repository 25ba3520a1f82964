//! Device reconciliation engine between `conftime-api` and the CLI.
//!
//! This crate owns the domain model and the reconcile loop:
//!
//! - **[`detect()`]** classifies a device into a [`DeviceFamily`] from the
//!   capabilities it advertised in its hello.
//!
//! - **[`Device`]** binds one [`Session`], populates mutable attributes
//!   from the running configuration, freezes a snapshot, and computes the
//!   diff between caller-supplied desired values and that snapshot.
//!   [`Device::update`] renders each changed attribute and submits it
//!   under the running-datastore lock. Read-only attributes (serial,
//!   model, interfaces) are fetched lazily and memoized.
//!
//! - **[`DocumentCache`]** keeps every source document fetched for a
//!   device so each is requested at most once.
//!
//! - **[`Reconciler`]** runs one [`Job`] end to end and turns every fault
//!   into a [`JobReport`]. [`Dispatcher`] strategies fan jobs out
//!   sequentially, over a bounded task pool, or through a durable queue
//!   consumed by [`QueueConsumer`] workers.
//!
//! - **[`Renderer`]** builds the family-specific edit payload for one
//!   attribute; [`TemplateRenderer`] does so from Jinja templates.

pub mod cache;
pub mod config;
pub mod detect;
pub mod device;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod render;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{DocumentCache, DocumentKind};
pub use config::{ApplyMode, ConnectionOptions};
pub use detect::detect;
pub use device::{AttributeMap, Device};
pub use dispatch::{
    AckPolicy, AmqpQueue, DispatchSummary, Dispatcher, JobQueue, MemoryQueue, PoolDispatcher,
    QueueConsumer, QueueProducer, SequentialDispatcher, Strategy, WorkerStats,
};
pub use document::Document;
pub use error::{CoreError, FaultKind};
pub use reconcile::{NoReport, Reconciler, ReportSink};
pub use render::{Renderer, TemplateRenderer};
pub use session::{Connector, NetconfConnector, Session};

pub use model::{
    AttributeDescriptor, AttributeValue, DesiredState, DeviceFamily, Fault, Job, JobReport,
    Outcome, Source, ValueKind,
};
