mod http_transport;

pub use http_transport::{HttpTransport, HttpTransportConfig, INGESTION_PATH};

/// Error type for a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to ingestion endpoint failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Delivers one serialized payload to the ingestion endpoint.
///
/// Implementations are shared read-only by every worker.
#[async_trait::async_trait]
pub trait Transport {
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError>;
}
