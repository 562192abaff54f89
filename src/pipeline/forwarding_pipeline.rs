use reqwest::Url;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, RwLock, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::{
    event::{Event, Fields},
    pipeline::{
        ConstructionError, DrainReport, Forwarder, SharedTransport,
        worker::{self, WorkerContext},
    },
    shaper::ReservedFields,
    transport::{HttpTransport, HttpTransportConfig},
};

/// Large enough to absorb bursts from the event source.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_WORKERS: usize = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How events are shaped and how many workers send them.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub reserved_fields: ReservedFields,
    pub merge_json_message: bool,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            reserved_fields: ReservedFields::default(),
            merge_json_message: false,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Everything needed to forward to a live ingestion endpoint.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub url: String,
    pub token: String,
    pub insecure_skip_verify: bool,
    pub request_timeout: Duration,
    pub debug: bool,
    pub options: PipelineOptions,
}

/// Forwards events through a bounded queue to a fixed pool of workers.
///
/// Each worker shapes, serializes and posts one event at a time. A failed
/// event is logged and dropped; it never affects the producer or other workers.
/// Dropping the pipeline without draining closes the queue and leaves the
/// workers to finish what is already queued.
pub struct Pipeline {
    /// `None` once the pipeline has been drained.
    tx: RwLock<Option<mpsc::Sender<Event>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    context: Arc<WorkerContext>,
}

impl Pipeline {
    /// Builds the HTTP transport and starts the workers. Must be called within a Tokio runtime.
    pub fn new(config: PipelineConfig) -> Result<Self, ConstructionError> {
        if config.url.trim().is_empty() {
            return Err(ConstructionError::EmptyUrl);
        }
        if config.token.is_empty() {
            return Err(ConstructionError::EmptyToken);
        }
        let url = Url::parse(&config.url).map_err(|e| ConstructionError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        info!("Using {url} for log insight");
        let transport = HttpTransport::new(HttpTransportConfig {
            url,
            token: config.token,
            insecure_skip_verify: config.insecure_skip_verify,
            request_timeout: config.request_timeout,
            debug: config.debug,
        })?;
        Self::with_transport(config.options, Arc::new(transport))
    }

    /// Starts the workers on top of an existing transport.
    pub fn with_transport(
        options: PipelineOptions,
        transport: SharedTransport,
    ) -> Result<Self, ConstructionError> {
        if options.workers == 0 {
            return Err(ConstructionError::NoWorkers);
        }
        if options.queue_capacity == 0 {
            return Err(ConstructionError::NoQueueCapacity);
        }

        let (tx, rx) = mpsc::channel(options.queue_capacity);
        let queue = Arc::new(Mutex::new(rx));
        let context = Arc::new(WorkerContext {
            transport,
            reserved_fields: options.reserved_fields,
            merge_json_message: options.merge_json_message,
            pending: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
        });

        let workers = (0..options.workers)
            .map(|id| {
                tokio::spawn(
                    worker::run(queue.clone(), context.clone()).instrument(info_span!("worker", id)),
                )
            })
            .collect();
        info!(
            workers = options.workers,
            capacity = options.queue_capacity,
            "Forwarding pipeline started"
        );

        Ok(Self {
            tx: RwLock::new(Some(tx)),
            workers: Mutex::new(workers),
            context,
        })
    }

    /// Submits from a synchronous thread, blocking it while the queue is full.
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_submit(&self, fields: Fields, message: String) {
        let Some(tx) = self.tx.blocking_read().clone() else {
            warn!("Pipeline is closed, dropping event");
            return;
        };
        self.context.pending.fetch_add(1, Ordering::AcqRel);
        if tx.blocking_send(Event::new(fields, message)).is_err() {
            self.context.pending.fetch_sub(1, Ordering::AcqRel);
            warn!("Pipeline is closed, dropping event");
        }
    }

    /// Events accepted but not yet sent or dropped by a worker.
    pub fn pending(&self) -> usize {
        self.context.pending.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl Forwarder for Pipeline {
    fn connect(&self) -> bool {
        true
    }

    async fn submit(&self, fields: Fields, message: String) {
        let Some(tx) = self.tx.read().await.clone() else {
            warn!("Pipeline is closed, dropping event");
            return;
        };
        // Counted before the send so a fast worker can never decrement first.
        self.context.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(Event::new(fields, message)).await.is_err() {
            self.context.pending.fetch_sub(1, Ordering::AcqRel);
            warn!("Pipeline is closed, dropping event");
        }
    }

    async fn drain(&self, timeout: Duration) -> DrainReport {
        // Dropping the last sender closes the queue once in-progress submits finish.
        if self.tx.write().await.take().is_none() {
            return DrainReport::default();
        }
        let mut workers = std::mem::take(&mut *self.workers.lock().await);
        info!(pending = self.pending(), "Draining forwarding pipeline");

        let mut joined = 0;
        let finished = tokio::time::timeout(timeout, async {
            for worker in workers.iter_mut() {
                let _ = worker.await;
                joined += 1;
            }
        })
        .await
        .is_ok();

        if !finished {
            self.context.shutdown.cancel();
            for worker in &workers[joined..] {
                worker.abort();
            }
            for worker in workers.iter_mut().skip(joined) {
                let _ = worker.await;
            }
        }

        // Idle workers that had not yet seen the closed queue lose nothing when cut off.
        let discarded = self.pending();
        let report = DrainReport {
            discarded,
            timed_out: !finished && discarded > 0,
        };
        if report.timed_out {
            warn!("Drain timed out after {timeout:?}, cancelled {discarded} unsent events");
        }
        info!(
            discarded = report.discarded,
            timed_out = report.timed_out,
            "Forwarding pipeline drained"
        );
        report
    }
}
