//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use loggerd::config::{LoggerdConfig, RemoteConfig};
use loggerd::http::HttpServer;
use loggerd::lifecycle::Shutdown;
use loggerd::observability::{Format, LokiClient, Loggers, StreamSink};

/// In-memory stand-in for stdout/stderr.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    pub fn json_lines(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("line is not a JSON object"))
            .collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captured output of both local sinks.
#[derive(Clone, Default)]
pub struct Outputs {
    pub stdout: Capture,
    pub stderr: Capture,
}

impl Outputs {
    /// Loggers writing into these captures, with an optional Loki base URL.
    pub fn loggers(&self, loki: Option<(&str, Duration)>) -> Arc<Loggers> {
        let remote = loki.map(|(url, timeout)| Arc::new(LokiClient::new(url, timeout).unwrap()));
        Arc::new(Loggers::with_local(
            Arc::new(StreamSink::new("stdout", Format::Json, self.stdout.clone())),
            Arc::new(StreamSink::new("stderr", Format::Text, self.stderr.clone())),
            remote,
            &RemoteConfig::default(),
        ))
    }
}

/// Start loggerd on an ephemeral port.
pub async fn start_server(config: LoggerdConfig, loggers: Arc<Loggers>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config, loggers);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

type LokiState = (Arc<Mutex<Vec<Value>>>, StatusCode, Duration);

/// A Loki push endpoint that records every body it receives.
pub struct FakeLoki {
    pub addr: SocketAddr,
    pushes: Arc<Mutex<Vec<Value>>>,
}

impl FakeLoki {
    /// Answer every push with `status` after `delay`.
    pub async fn start(status: StatusCode, delay: Duration) -> Self {
        let pushes = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/loki/api/v1/push", post(push))
            .with_state((pushes.clone(), status, delay));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, pushes }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn pushes(&self) -> Vec<Value> {
        self.pushes.lock().unwrap().clone()
    }
}

async fn push(State((pushes, status, delay)): State<LokiState>, Json(body): Json<Value>) -> StatusCode {
    tokio::time::sleep(delay).await;
    pushes.lock().unwrap().push(body);
    status
}

/// A Loki endpoint that answers 500 and hangs up partway through the body it
/// announced.
pub async fn start_truncated_loki() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Read one request head and its `content-length` body.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}
