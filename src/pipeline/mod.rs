mod forward_error;
mod forwarding_pipeline;
mod noop;
mod worker;

use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{config::Settings, event::Fields, transport::Transport};

pub use forward_error::ForwardError;
pub use forwarding_pipeline::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS, Pipeline, PipelineConfig,
    PipelineOptions,
};
pub use noop::NoopForwarder;

pub type SharedTransport = Arc<dyn Transport + Send + Sync + 'static>;
pub type SharedForwarder = Arc<dyn Forwarder + Send + Sync + 'static>;

/// Error type for building a forwarder. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("ingestion URL must not be empty")]
    EmptyUrl,

    #[error("ingestion token must not be empty")]
    EmptyToken,

    #[error("invalid ingestion URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("queue capacity must be at least 1")]
    NoQueueCapacity,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Outcome of [`Forwarder::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Accepted events that were never sent: still queued, or cut off by the timeout.
    pub discarded: usize,
    /// The timeout expired with events still unsent.
    pub timed_out: bool,
}

/// The entry point the rest of the system feeds events into.
///
/// The live pipeline and the no-op variant honour the same contract, so the
/// choice between them is made once, at configuration time.
#[async_trait::async_trait]
pub trait Forwarder {
    /// Reports whether the forwarder is ready. Connectivity is not checked.
    fn connect(&self) -> bool;

    /// Hands an event over. Waits while the queue is full; never fails.
    async fn submit(&self, fields: Fields, message: String);

    /// Stops accepting events and waits up to `timeout` for queued and
    /// in-flight sends to finish.
    async fn drain(&self, timeout: Duration) -> DrainReport;
}

/// Builds the forwarder selected by `settings`.
pub fn build_forwarder(settings: &Settings) -> Result<SharedForwarder, ConstructionError> {
    if settings.noop {
        info!("Forwarding disabled, events will be discarded");
        return Ok(Arc::new(NoopForwarder::new()));
    }
    Ok(Arc::new(Pipeline::new(settings.pipeline_config())?))
}
