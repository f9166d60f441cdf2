//! Remote sink pushing events to a Grafana Loki instance.
//!
//! # Data Flow
//! ```text
//! LogEvent
//!     → labels (fixed attrs + level)
//!     → line (event as JSON, no timestamp)
//!     → POST {base}/loki/api/v1/push
//! ```
//!
//! # Design Decisions
//! - One HTTP client is shared by every Loki sink in the process
//! - Every push is bounded by the client timeout; nothing is queued or retried
//! - Non-string fixed attributes are rendered as JSON text in labels

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::observability::event::{Fields, LogEvent};
use crate::observability::sink::{Sink, SinkError};

/// Path of the push endpoint relative to the Loki base URL.
pub const PUSH_PATH: &str = "/loki/api/v1/push";

/// Cap on how much of an error response body is kept in a [`SinkError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the Loki push API.
#[derive(Debug)]
pub struct LokiClient {
    http: reqwest::Client,
    push_url: String,
    timeout: Duration,
}

impl LokiClient {
    /// Build a client for the given base URL (e.g. `http://localhost:3100`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            push_url: push_url(base_url),
            timeout,
        })
    }

    /// Build a client from the `[remote]` section, if a Loki URL is configured.
    pub fn from_config(config: &RemoteConfig) -> Result<Option<Self>, reqwest::Error> {
        match config.loki_url.as_deref() {
            Some(url) => Self::new(url, Duration::from_millis(config.timeout_ms)).map(Some),
            None => Ok(None),
        }
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    async fn push(&self, body: &PushRequest<'_>) -> Result<(), SinkError> {
        let response = self
            .http
            .post(&self.push_url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("<unreadable body: {e}>"),
        };
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Err(SinkError::Status { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> SinkError {
        if err.is_timeout() {
            SinkError::Timeout(self.timeout)
        } else {
            SinkError::Transport(err)
        }
    }
}

fn push_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), PUSH_PATH)
}

#[derive(Serialize)]
struct PushRequest<'a> {
    streams: [PushStream<'a>; 1],
}

#[derive(Serialize)]
struct PushStream<'a> {
    stream: BTreeMap<&'a str, String>,
    values: [[String; 2]; 1],
}

/// A [`Sink`] forwarding each event to Loki as a single-entry push.
pub struct LokiSink {
    client: Arc<LokiClient>,
    attrs: Fields,
}

impl LokiSink {
    pub fn new(client: Arc<LokiClient>) -> Self {
        Self {
            client,
            attrs: Fields::new(),
        }
    }

    /// Attach fixed attributes sent as stream labels with every event.
    pub fn with_attrs(mut self, attrs: Fields) -> Self {
        self.attrs.extend(attrs);
        self
    }

    fn build_request<'a>(&'a self, event: &LogEvent) -> Result<PushRequest<'a>, SinkError> {
        let mut labels: BTreeMap<&str, String> = self
            .attrs
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.as_str(), value)
            })
            .collect();
        labels.insert("level", event.level().as_label().to_owned());

        let timestamp = event.time().timestamp_nanos_opt().unwrap_or_default();
        let line = serde_json::to_string(&event.to_json(&Fields::new(), false))?;

        Ok(PushRequest {
            streams: [PushStream {
                stream: labels,
                values: [[timestamp.to_string(), line]],
            }],
        })
    }
}

#[async_trait]
impl Sink for LokiSink {
    fn name(&self) -> &str {
        "loki"
    }

    async fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        let request = self.build_request(event)?;
        self.client.push(&request).await
    }
}
