use reqwest::{Client, Url, header::CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::transport::{Transport, TransportError};

/// Path of the ingestion stream on the ingestion host.
pub const INGESTION_PATH: &str = "/le-mans/v1/streams/ingestion-pipeline-stream";

const USER_AGENT: &str = concat!("insight-forwarder/", env!("CARGO_PKG_VERSION"));

pub struct HttpTransportConfig {
    pub url: Url,
    pub token: String,
    pub insecure_skip_verify: bool,
    pub request_timeout: Duration,
    /// Logs each send and the response status and body.
    pub debug: bool,
}

/// Posts payloads to the ingestion endpoint with bearer-token authorization.
///
/// The client, and with it the TLS verification policy, is built once and
/// shared by every worker.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
    token: String,
    debug: bool,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, reqwest::Error> {
        if config.insecure_skip_verify {
            warn!("TLS certificate verification is disabled for the ingestion endpoint");
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;
        Ok(Self {
            client,
            url: config.url,
            token: config.token,
            debug: config.debug,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all)]
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError> {
        if self.debug {
            debug!(bytes = body.len(), "Post being sent");
        }
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        // The body carries no contract; read it so the connection can be reused.
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!("Ingestion endpoint answered {status}");
        }
        if self.debug {
            debug!("Post response code {status} with body {text}");
        }
        Ok(())
    }
}
