//! Prometheus exposition over HTTP
//!
//! A minimal async HTTP/1.x responder for scrapers. One request per
//! connection, answered and closed.
//!
//! # Limits
//! - **Connection limit**: at most `MAX_CONNECTIONS` scrapes in flight
//! - **Timeouts**: the request head must arrive within `READ_TIMEOUT`
//! - **Message limit**: request heads larger than `MAX_REQUEST_SIZE` are dropped

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::Metrics;
use crate::constants::metrics;
use crate::error::{PoeError, Result};

const INDEX_BODY: &str = "<html><head><title>rockpi-poe</title></head>\
<body><h1>rockpi-poe fan controller</h1><p><a href=\"/metrics\">Metrics</a></p></body></html>\n";

/// HTTP endpoint serving a [`Metrics`] registry
pub struct MetricsServer {
    host: String,
    port: u16,
    registry: Arc<Metrics>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl MetricsServer {
    pub fn new(host: impl Into<String>, port: u16, registry: Arc<Metrics>) -> Self {
        Self {
            host: host.into(),
            port,
            registry,
            shutdown: Arc::new(Notify::new()),
            task: None,
            local_addr: None,
        }
    }

    /// Bind and spawn the accept loop
    ///
    /// Returns the bound address (useful with port 0). Starting a running
    /// server logs a warning and returns the existing address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let (Some(_), Some(addr)) = (&self.task, self.local_addr) {
            warn!("Metrics server already running on {}", addr);
            return Ok(addr);
        }

        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                PoeError::MetricsServer(format!(
                    "failed to bind {}:{}: {}",
                    self.host, self.port, e
                ))
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| PoeError::MetricsServer(format!("failed to query bound address: {}", e)))?;

        info!("Metrics server listening on http://{}/metrics", addr);

        let registry = Arc::clone(&self.registry);
        let shutdown = Arc::clone(&self.shutdown);
        self.task = Some(tokio::spawn(accept_loop(listener, registry, shutdown)));
        self.local_addr = Some(addr);

        Ok(addr)
    }

    /// Stop accepting and wait for the accept loop to exit
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        self.shutdown.notify_one();
        if let Err(e) = task.await {
            error!("Metrics server task ended abnormally: {}", e);
        }
        if let Some(addr) = self.local_addr.take() {
            info!("Metrics server on {} stopped", addr);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for MetricsServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, registry: Arc<Metrics>, shutdown: Arc<Notify>) {
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let current = active.load(Ordering::SeqCst);
                        if current >= metrics::MAX_CONNECTIONS {
                            warn!("Connection limit reached ({}), rejecting {}", current, peer);
                            drop(stream);
                            continue;
                        }

                        active.fetch_add(1, Ordering::SeqCst);
                        let registry = Arc::clone(&registry);
                        let active = Arc::clone(&active);

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &registry).await {
                                debug!("Scrape from {} failed: {}", peer, e);
                            }
                            active.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown.notified() => {
                debug!("Metrics accept loop shutting down");
                break;
            }
        }
    }
}

/// Read the request head up to the blank line, bounded in size
async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(head);
        }
        head.extend_from_slice(&chunk[..n]);

        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.windows(2).any(|w| w == b"\n\n") {
            return Ok(head);
        }
        if head.len() > metrics::MAX_REQUEST_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Request head too large",
            ));
        }
    }
}

async fn handle_connection(mut stream: TcpStream, registry: &Metrics) -> std::io::Result<()> {
    let head = match timeout(metrics::READ_TIMEOUT, read_request_head(&mut stream)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Timed out reading request",
            ))
        }
    };

    let (status, content_type, body) = route(&head, registry);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Map a request head to (status line, content type, body)
fn route(head: &[u8], registry: &Metrics) -> (&'static str, &'static str, String) {
    let request_line = head
        .split(|b| *b == b'\n')
        .next()
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .unwrap_or_default();

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let path = target.split('?').next().unwrap_or("");

    match (method, path) {
        ("GET", "/metrics") => ("200 OK", metrics::CONTENT_TYPE, registry.render()),
        ("GET", "/") => ("200 OK", "text/html; charset=utf-8", INDEX_BODY.to_string()),
        _ => (
            "404 Not Found",
            "text/plain; charset=utf-8",
            "Not Found\n".to_string(),
        ),
    }
}
