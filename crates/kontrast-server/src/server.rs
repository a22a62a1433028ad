// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded HTTP server for the upload form.
//
// A single Tokio task accepts TCP connections and hands each one to its own
// task. A connection carries exactly one request; the response is written and
// the socket closed. Shutdown is signalled through a `Notify` and the accept
// task is joined before `stop` returns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use kontrast_core::error::{KontrastError, Result};
use kontrast_core::{AppConfig, ServerStatus};

use crate::http::{HttpResponse, read_request};
use crate::routes::{AppState, dispatch, error_response};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How long a client may take to send its whole request.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The HTTP front end for the enhancer.
pub struct EnhanceServer {
    /// Address to bind; port 0 picks an ephemeral port.
    bind_addr: SocketAddr,
    /// Address actually bound, once running.
    local_addr: Option<SocketAddr>,
    status: ServerStatus,
    state: Arc<AppState>,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
}

impl EnhanceServer {
    /// Create a stopped server for `config`, serving `state`.
    pub fn new(config: &AppConfig, state: AppState) -> Self {
        Self {
            bind_addr: SocketAddr::new(config.bind_address, config.port),
            local_addr: None,
            status: ServerStatus::Stopped,
            state: Arc::new(state),
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// Returns the bound address. Calling `start` on a running server is a
    /// no-op that returns the existing address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "server already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;

        let listener = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                return Err(KontrastError::Server(format!("bind {}: {e}", self.bind_addr)));
            }
        };
        let addr = listener.local_addr()?;
        info!(%addr, "Kontrast listening");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let connections = Arc::clone(&self.active_connections);
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, connections, state).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(addr);
        self.status = ServerStatus::Running;
        Ok(addr)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Connections already being served run to completion on their own tasks.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "stopping server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| KontrastError::Server(format!("task join: {e}")))?;
        }

        self.local_addr = None;
        self.status = ServerStatus::Stopped;
        info!("server stopped");
        Ok(())
    }

    async fn accept_loop(
        listener: TcpListener,
        shutdown: Arc<Notify>,
        connections: Arc<AtomicU32>,
        state: Arc<AppState>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "connection accepted");
                            let state = Arc::clone(&state);
                            let connections = Arc::clone(&connections);
                            tokio::spawn(async move {
                                connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = Self::handle_connection(stream, peer, state).await {
                                    warn!(%peer, error = %e, "connection handler error");
                                }
                                connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Read one request, answer it, close the connection.
    async fn handle_connection(
        mut stream: TcpStream,
        peer: SocketAddr,
        state: Arc<AppState>,
    ) -> Result<()> {
        let read = tokio::time::timeout(
            READ_TIMEOUT,
            read_request(&mut stream, state.max_upload_bytes),
        )
        .await;

        let response = match read {
            Err(_) => {
                warn!(%peer, "request timed out");
                let body = serde_json::json!({ "error": "Request timed out." }).to_string();
                HttpResponse::new(408, "application/json", body.into_bytes())
            }
            Ok(Ok(None)) => {
                debug!(%peer, "peer closed without a request");
                return Ok(());
            }
            Ok(Err(e)) => error_response(&e),
            Ok(Ok(Some(request))) => {
                let method = request.method.clone();
                let path = request.path.clone();
                let response = dispatch(state, request).await;
                info!(
                    %peer,
                    %method,
                    %path,
                    status = response.status,
                    bytes = response.body.len(),
                    "request served"
                );
                response
            }
        };

        stream.write_all(&response.to_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use image::{GrayImage, Luma};
    use tokio::io::AsyncReadExt;

    use kontrast_enhance::{OutputFormat, encode};

    fn test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            upload_dir: dir.join("uploads"),
            processed_dir: dir.join("processed"),
            histogram_dir: dir.join("histograms"),
            ..AppConfig::default()
        }
    }

    async fn start(dir: &std::path::Path) -> (EnhanceServer, SocketAddr) {
        let config = test_config(dir);
        config.ensure_dirs().unwrap();
        let mut server = EnhanceServer::new(&config, AppState::from_config(&config));
        let addr = server.start().await.unwrap();
        (server, addr)
    }

    async fn roundtrip(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, addr) = start(dir.path()).await;
        assert_eq!(server.status(), ServerStatus::Running);
        assert_eq!(server.local_addr(), Some(addr));
        assert_ne!(addr.port(), 0);
        assert_eq!(server.active_connections(), 0);

        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn serves_upload_form() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, addr) = start(dir.path()).await;

        let response = roundtrip(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("name=\"image\""));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_path_is_404_json() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, addr) = start(dir.path()).await;

        let response = roundtrip(addr, b"GET /nowhere HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("{\"error\":\"Not found.\"}"));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn upload_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, addr) = start(dir.path()).await;

        let img = GrayImage::from_fn(32, 32, |x, y| Luma([(60 + x * 2 + y) as u8]));
        let png = encode(&img, OutputFormat::Png).unwrap();

        let mut body = Vec::new();
        body.extend_from_slice(
            b"--xyz\r\nContent-Disposition: form-data; name=\"image\"; filename=\"t.png\"\r\nContent-Type: image/png\r\n\r\n",
        );
        body.extend_from_slice(&png);
        body.extend_from_slice(
            b"\r\n--xyz\r\nContent-Disposition: form-data; name=\"method\"\r\n\r\nAHE\r\n--xyz--\r\n",
        );
        let mut request = format!(
            "POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary=xyz\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        request.extend_from_slice(&body);

        let response = roundtrip(addr, &request).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("/static/processed/processed_"));
        assert!(response.contains("(AHE)"));

        let written = std::fs::read_dir(dir.path().join("histograms")).unwrap().count();
        assert_eq!(written, 2);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_upload_bytes = 16;
        config.ensure_dirs().unwrap();
        let mut server = EnhanceServer::new(&config, AppState::from_config(&config));
        let addr = server.start().await.unwrap();

        let response = roundtrip(
            addr,
            b"POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=a\r\nContent-Length: 1000\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(response.contains("Upload too large."));

        server.stop().await.unwrap();
    }
}
