use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Mutex, mpsc::Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    event::Event,
    pipeline::{SharedTransport, forward_error::ForwardError},
    shaper::{ReservedFields, shape},
};

/// The receiving end of the queue, shared by all workers.
pub(super) type SharedQueue = Arc<Mutex<Receiver<Event>>>;

/// State shared by the pipeline and its workers.
pub(super) struct WorkerContext {
    pub transport: SharedTransport,
    pub reserved_fields: ReservedFields,
    pub merge_json_message: bool,
    /// Events accepted by `submit` that no worker has finished with yet.
    pub pending: AtomicUsize,
    pub shutdown: CancellationToken,
}

impl WorkerContext {
    async fn forward(&self, event: Event) -> Result<(), ForwardError> {
        let payload = shape(
            &event.fields,
            &event.message,
            &self.reserved_fields,
            self.merge_json_message,
        )?;
        let body = serde_json::to_vec(&payload).map_err(ForwardError::SerializationFailure)?;
        self.transport.send(body).await?;
        Ok(())
    }
}

/// Takes events off the queue until it is closed and empty, or shutdown is signalled.
pub(super) async fn run(queue: SharedQueue, context: Arc<WorkerContext>) {
    debug!("Worker started");
    loop {
        let next = tokio::select! {
            _ = context.shutdown.cancelled() => break,
            event = next_event(&queue) => event,
        };
        let Some(event) = next else {
            break;
        };
        // Checked between dequeue and send; the event stays counted as pending.
        if context.shutdown.is_cancelled() {
            break;
        }

        if let Err(err) = context.forward(event).await {
            error!(error_code = err.as_ref(), "Dropping event: {err}");
        }
        context.pending.fetch_sub(1, Ordering::AcqRel);
    }
    debug!("Worker stopped");
}

// The lock is released before the event is processed, so a slow send never
// holds up the other workers.
async fn next_event(queue: &Mutex<Receiver<Event>>) -> Option<Event> {
    queue.lock().await.recv().await
}
