// ── Queue-backed dispatch ──
//
// The producer serializes jobs as JSON onto a durable queue and returns
// without waiting. Workers consume one message at a time and run one
// reconciliation per message. By default a message is acknowledged only
// after its run succeeds; faults and undecodable bodies are rejected
// without requeue so the broker dead-letters them.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DispatchSummary, Dispatcher};
use crate::error::CoreError;
use crate::model::{Job, JobReport};
use crate::reconcile::Reconciler;
use crate::session::Connector;

pub const DEFAULT_QUEUE: &str = "netconf";
const DEAD_LETTER_SUFFIX: &str = ".dead";
const CONTENT_TYPE: &str = "application/json";
const PERSISTENT: u8 = 2;

impl From<lapin::Error> for CoreError {
    fn from(err: lapin::Error) -> Self {
        CoreError::Queue {
            message: err.to_string(),
        }
    }
}

/// When a worker acknowledges a message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AckPolicy {
    /// Ack on success; reject (dead-letter) on fault or bad body.
    #[default]
    AfterRun,
    /// Ack as soon as the message arrives. A crash mid-run loses the job.
    OnReceipt,
}

/// One received message.
#[derive(Debug)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
    acker: Acker,
}

#[derive(Debug)]
enum Acker {
    Amqp(lapin::acker::Acker),
    Memory,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, job: &Job) -> Result<(), CoreError>;

    /// Wait for the next message. `None` once the queue is closed.
    async fn next(&self) -> Result<Option<Delivery>, CoreError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), CoreError>;

    /// Reject without requeue.
    async fn reject(&self, delivery: &Delivery) -> Result<(), CoreError>;
}

// ── AMQP ────────────────────────────────────────────────────────────

/// RabbitMQ queue over `lapin`.
pub struct AmqpQueue {
    // Held so the channel stays open.
    _connection: Connection,
    channel: Channel,
    name: String,
    consumer: Mutex<Option<Consumer>>,
}

impl std::fmt::Debug for AmqpQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpQueue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AmqpQueue {
    /// Connect and declare `name` (durable) plus its dead-letter queue.
    pub async fn connect(url: &str, name: &str) -> Result<Self, CoreError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| CoreError::Queue {
                message: format!("cannot connect to broker: {e}"),
            })?;
        let channel = connection.create_channel().await?;

        let dead = format!("{name}{DEAD_LETTER_SUFFIX}");
        let durable = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        channel
            .queue_declare(&dead, durable, FieldTable::default())
            .await?;

        let mut args = FieldTable::default();
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(String::new().into()),
        );
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(dead.clone().into()),
        );
        channel.queue_declare(name, durable, args).await?;
        info!(queue = name, dead_letter = %dead, "queue declared");

        Ok(Self {
            _connection: connection,
            channel,
            name: name.to_owned(),
            consumer: Mutex::new(None),
        })
    }

    async fn start_consumer(&self) -> Result<Consumer, CoreError> {
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await?;
        let consumer = self
            .channel
            .basic_consume(
                &self.name,
                "conftime-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        debug!(queue = %self.name, "consumer started");
        Ok(consumer)
    }
}

#[async_trait]
impl JobQueue for AmqpQueue {
    async fn publish(&self, job: &Job) -> Result<(), CoreError> {
        let body = job.to_json()?;
        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE.into())
            .with_delivery_mode(PERSISTENT);
        self.channel
            .basic_publish(
                "",
                &self.name,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await?
            .await?;
        debug!(queue = %self.name, host = %job.host, job = %job.id, "published");
        Ok(())
    }

    async fn next(&self) -> Result<Option<Delivery>, CoreError> {
        let mut guard = self.consumer.lock().await;
        if guard.is_none() {
            *guard = Some(self.start_consumer().await?);
        }
        let Some(consumer) = guard.as_mut() else {
            return Ok(None);
        };
        match consumer.next().await {
            Some(Ok(delivery)) => Ok(Some(Delivery {
                tag: delivery.delivery_tag,
                body: delivery.data,
                acker: Acker::Amqp(delivery.acker),
            })),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), CoreError> {
        if let Acker::Amqp(acker) = &delivery.acker {
            acker.ack(BasicAckOptions::default()).await?;
        }
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery) -> Result<(), CoreError> {
        if let Acker::Amqp(acker) = &delivery.acker {
            acker
                .reject(BasicRejectOptions { requeue: false })
                .await?;
        }
        Ok(())
    }
}

// ── In-process ──────────────────────────────────────────────────────

/// Unbounded in-memory queue. Records acks and rejects by delivery tag.
#[derive(Debug)]
pub struct MemoryQueue {
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    next_tag: AtomicU64,
    acked: StdMutex<Vec<u64>>,
    rejected: StdMutex<Vec<u64>>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
            next_tag: AtomicU64::new(1),
            acked: StdMutex::new(Vec::new()),
            rejected: StdMutex::new(Vec::new()),
        }
    }

    /// Enqueue a raw body, bypassing serialization.
    pub fn publish_raw(&self, body: Vec<u8>) -> Result<(), CoreError> {
        let guard = self.tx.lock().map_err(|e| CoreError::Internal(e.to_string()))?;
        let tx = guard.as_ref().ok_or_else(|| CoreError::Queue {
            message: "queue closed".into(),
        })?;
        tx.send(body).map_err(|_| CoreError::Queue {
            message: "queue closed".into(),
        })
    }

    /// Stop accepting messages. Consumers drain what is left, then see
    /// the end of the queue.
    pub fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }

    pub fn acked(&self) -> Vec<u64> {
        self.acked.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn rejected(&self) -> Vec<u64> {
        self.rejected.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn record(list: &StdMutex<Vec<u64>>, tag: u64) -> Result<(), CoreError> {
        list.lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?
            .push(tag);
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn publish(&self, job: &Job) -> Result<(), CoreError> {
        self.publish_raw(job.to_json()?)
    }

    async fn next(&self) -> Result<Option<Delivery>, CoreError> {
        let body = self.rx.lock().await.recv().await;
        Ok(body.map(|body| Delivery {
            tag: self.next_tag.fetch_add(1, Ordering::SeqCst),
            body,
            acker: Acker::Memory,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), CoreError> {
        Self::record(&self.acked, delivery.tag)
    }

    async fn reject(&self, delivery: &Delivery) -> Result<(), CoreError> {
        Self::record(&self.rejected, delivery.tag)
    }
}

// ── Producer ────────────────────────────────────────────────────────

/// Publishes every job and returns immediately.
pub struct QueueProducer<Q: JobQueue> {
    queue: Arc<Q>,
}

impl<Q: JobQueue> QueueProducer<Q> {
    pub fn new(queue: Arc<Q>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl<Q: JobQueue + 'static> Dispatcher for QueueProducer<Q> {
    async fn dispatch(&self, jobs: Vec<Job>) -> Result<DispatchSummary, CoreError> {
        for job in &jobs {
            self.queue.publish(job).await?;
        }
        info!(count = jobs.len(), "jobs published");
        Ok(DispatchSummary::Published(jobs.len()))
    }
}

// ── Consumer ────────────────────────────────────────────────────────

/// Counters for one worker session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub undecodable: u64,
}

/// Pulls jobs one at a time and reconciles each.
pub struct QueueConsumer<Q: JobQueue, C: Connector> {
    queue: Arc<Q>,
    reconciler: Arc<Reconciler<C>>,
    ack: AckPolicy,
}

impl<Q: JobQueue, C: Connector> QueueConsumer<Q, C> {
    pub fn new(queue: Arc<Q>, reconciler: Arc<Reconciler<C>>, ack: AckPolicy) -> Self {
        Self {
            queue,
            reconciler,
            ack,
        }
    }

    /// Consume until `cancel` fires or the queue closes. `on_report` sees
    /// every finished job.
    pub async fn run<F>(&self, cancel: CancellationToken, mut on_report: F) -> Result<WorkerStats, CoreError>
    where
        F: FnMut(&JobReport) + Send,
    {
        let mut stats = WorkerStats::default();
        info!(ack = %self.ack, "waiting for jobs");

        loop {
            let delivery = tokio::select! {
                () = cancel.cancelled() => {
                    info!("worker cancelled");
                    break;
                }
                next = self.queue.next() => next?,
            };
            let Some(delivery) = delivery else {
                info!("queue closed");
                break;
            };
            stats.received += 1;

            if self.ack == AckPolicy::OnReceipt {
                self.queue.ack(&delivery).await?;
            }

            let job = match Job::from_json(&delivery.body) {
                Ok(job) => job,
                Err(e) => {
                    warn!(tag = delivery.tag, error = %e, "undecodable message");
                    stats.undecodable += 1;
                    if self.ack == AckPolicy::AfterRun {
                        self.queue.reject(&delivery).await?;
                    }
                    continue;
                }
            };

            let report = self.reconciler.run(&job).await;
            on_report(&report);
            if report.is_ok() {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }

            if self.ack == AckPolicy::AfterRun {
                if report.is_ok() {
                    self.queue.ack(&delivery).await?;
                } else {
                    self.queue.reject(&delivery).await?;
                }
            }
        }
        Ok(stats)
    }
}
