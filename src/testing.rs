//! Test doubles shared by the unit tests.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Semaphore,
};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        ServerConfig,
        crypto::ring,
        pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject},
    },
};

use crate::transport::{INGESTION_PATH, Transport, TransportError};

/// Records every payload instead of sending it.
///
/// A gated transport holds each send until a permit is released, which keeps
/// workers busy mid-send.
#[derive(Default)]
pub struct RecordingTransport {
    started: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    gate: Option<Semaphore>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Lets `n` held sends complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Number of sends that have begun, including those still held by the gate.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    pub async fn wait_for_started(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.started() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sends did not start in time");
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let body = serde_json::from_slice(&body).unwrap();
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}

/// A request as seen by [`IngestionServer`].
#[derive(Debug, Clone)]
pub struct Received {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

struct ServerState {
    received: Mutex<Vec<Received>>,
    status: StatusCode,
}

/// Local stand-in for the ingestion endpoint.
pub struct IngestionServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl IngestionServer {
    pub async fn start() -> Self {
        Self::start_with_status(StatusCode::OK).await
    }

    pub async fn start_with_status(status: StatusCode) -> Self {
        let state = Arc::new(ServerState {
            received: Mutex::new(Vec::new()),
            status,
        });
        let app = Router::new()
            .route(INGESTION_PATH, post(ingest))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, INGESTION_PATH)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn ingest(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header_value = |name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let received = Received {
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.received.lock().unwrap().push(received);
    state.status
}

const LOCALHOST_CERT: &[u8] = include_bytes!("../test_resources/localhost.crt");
const LOCALHOST_KEY: &[u8] = include_bytes!("../test_resources/localhost.key");
const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// HTTPS endpoint presenting a self-signed certificate for `localhost`.
///
/// Answers every complete request with `200 OK` and counts it. Connections
/// that fail the handshake are never counted.
pub struct SelfSignedServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
}

impl SelfSignedServer {
    pub async fn start() -> Self {
        let cert = CertificateDer::from_pem_slice(LOCALHOST_CERT).unwrap();
        let key = PrivateKeyDer::from_pem_slice(LOCALHOST_KEY).unwrap();
        let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let acceptor = acceptor.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = acceptor.accept(stream).await else {
                        return;
                    };
                    if read_request(&mut stream).await.is_some() {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let _ = stream.write_all(OK_RESPONSE).await;
                        let _ = stream.shutdown().await;
                    }
                });
            }
        });
        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("https://{}{}", self.addr, INGESTION_PATH)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Reads one HTTP/1.1 request: the head, then `content-length` bytes of body.
async fn read_request<S>(stream: &mut S) -> Option<Vec<u8>>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(buf.split_off(head_end))
}

/// A URL on a local port with nothing listening.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}{INGESTION_PATH}")
}
