//! Remote (Loki) mirroring and its failure isolation.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use loggerd::config::LoggerdConfig;
use loggerd::http::HttpServer;
use loggerd::observability::{Fields, LogEvent, LokiClient, LokiSink, Severity, Sink, SinkError};

mod common;

use common::{FakeLoki, Outputs};

const TIMEOUT: Duration = Duration::from_millis(300);

fn entry_line(push: &Value) -> Value {
    let line = push["streams"][0]["values"][0][1].as_str().unwrap();
    serde_json::from_str(line).unwrap()
}

#[tokio::test]
async fn test_records_are_mirrored_to_loki() {
    let loki = FakeLoki::start(StatusCode::NO_CONTENT, Duration::ZERO).await;
    let outputs = Outputs::default();
    let loggers = outputs.loggers(Some((&loki.url(), TIMEOUT)));
    let (addr, shutdown) = common::start_server(LoggerdConfig::default(), loggers).await;

    let res = common::client()
        .put(format!("http://{}/items/9", addr))
        .body("v=1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(outputs.stdout.lines().len(), 1);

    let pushes = loki.pushes();
    assert_eq!(pushes.len(), 1);
    let stream = &pushes[0]["streams"][0];
    assert_eq!(stream["stream"]["service_name"], "loggerd");
    assert_eq!(stream["stream"]["level"], "info");

    let line = entry_line(&pushes[0]);
    assert_eq!(line["msg"], "Received request");
    assert_eq!(line["request"]["method"], "PUT");
    assert_eq!(line["request"]["pattern"], "/items/9");

    assert!(outputs.stderr.lines().is_empty());
    shutdown.trigger();
}

#[tokio::test]
async fn test_errors_are_mirrored_to_loki() {
    let loki = FakeLoki::start(StatusCode::NO_CONTENT, Duration::ZERO).await;
    let outputs = Outputs::default();
    let server = HttpServer::new(
        LoggerdConfig::default(),
        outputs.loggers(Some((&loki.url(), TIMEOUT))),
    );

    let chunks = vec![Err::<Bytes, _>(io::Error::new(io::ErrorKind::UnexpectedEof, "client went away"))];
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .body(Body::from_stream(futures_util::stream::iter(chunks)))
        .unwrap();

    let res = server.router().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(outputs.stdout.lines().is_empty());
    assert_eq!(outputs.stderr.lines().len(), 1);

    let pushes = loki.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0]["streams"][0]["stream"]["level"], "error");
    assert_eq!(pushes[0]["streams"][0]["stream"]["service_name"], "loggerd");
    let line = entry_line(&pushes[0]);
    assert_eq!(line["msg"], "Failed to read request body");
    assert!(line["error"].as_str().unwrap().contains("client went away"));
}

#[tokio::test]
async fn test_loki_error_status_does_not_affect_response() {
    let loki = FakeLoki::start(StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
    let outputs = Outputs::default();
    let loggers = outputs.loggers(Some((&loki.url(), TIMEOUT)));
    let (addr, shutdown) = common::start_server(LoggerdConfig::default(), loggers).await;

    let res = common::client()
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(outputs.stdout.lines().len(), 1, "local record survives a remote failure");
    assert_eq!(loki.pushes().len(), 1);
    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_loki_is_bounded_by_timeout() {
    let loki = FakeLoki::start(StatusCode::NO_CONTENT, Duration::from_secs(5)).await;
    let outputs = Outputs::default();
    let loggers = outputs.loggers(Some((&loki.url(), TIMEOUT)));
    let (addr, shutdown) = common::start_server(LoggerdConfig::default(), loggers).await;

    let start = Instant::now();
    let res = common::client()
        .get(format!("http://{}/slow", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
    assert_eq!(outputs.stdout.lines().len(), 1);
    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_loki_does_not_affect_response() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let outputs = Outputs::default();
    let loggers = outputs.loggers(Some((&dead, TIMEOUT)));
    let (addr, shutdown) = common::start_server(LoggerdConfig::default(), loggers).await;

    let res = common::client()
        .post(format!("http://{}/events", addr))
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(outputs.stdout.lines().len(), 1);
    shutdown.trigger();
}

#[tokio::test]
async fn test_loki_sink_reports_failures() {
    let failing = FakeLoki::start(StatusCode::BAD_REQUEST, Duration::ZERO).await;
    let slow = FakeLoki::start(StatusCode::NO_CONTENT, Duration::from_secs(5)).await;
    let event = LogEvent::new(Severity::Info, "ping", Fields::new());

    let sink = LokiSink::new(Arc::new(LokiClient::new(&failing.url(), TIMEOUT).unwrap()));
    match sink.emit(&event).await {
        Err(SinkError::Status { status, .. }) => assert_eq!(status, StatusCode::BAD_REQUEST),
        other => panic!("expected status error, got {:?}", other),
    }

    let sink = LokiSink::new(Arc::new(LokiClient::new(&slow.url(), TIMEOUT).unwrap()));
    match sink.emit(&event).await {
        Err(SinkError::Timeout(after)) => assert_eq!(after, TIMEOUT),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreadable_error_body_is_reported() {
    let addr = common::start_truncated_loki().await;
    let sink = LokiSink::new(Arc::new(LokiClient::new(&format!("http://{}", addr), TIMEOUT).unwrap()));
    let event = LogEvent::new(Severity::Error, "ping", Fields::new());

    match sink.emit(&event).await {
        Err(SinkError::Status { status, body }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body.starts_with("<unreadable body:"), "body was {:?}", body);
        }
        other => panic!("expected status error, got {:?}", other),
    }
}
