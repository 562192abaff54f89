use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tracing::trace;

use crate::{
    event::Fields,
    pipeline::{DrainReport, Forwarder},
};

/// Accepts every event and discards it without touching the network.
#[derive(Debug, Default)]
pub struct NoopForwarder {
    submitted: AtomicUsize,
}

impl NoopForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Forwarder for NoopForwarder {
    fn connect(&self) -> bool {
        true
    }

    async fn submit(&self, _fields: Fields, _message: String) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        trace!("Discarding event");
    }

    async fn drain(&self, _timeout: Duration) -> DrainReport {
        DrainReport::default()
    }
}
