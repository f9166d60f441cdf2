//! The sink capability shared by local and remote destinations.

use std::time::Duration;

use async_trait::async_trait;

use crate::observability::event::LogEvent;

/// Error returned by a single sink write.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The local output stream could not be written.
    #[error("write to {sink} failed: {source}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    /// The event could not be encoded.
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// A previous writer panicked while holding the stream lock.
    #[error("output stream of {0} is poisoned")]
    Poisoned(String),

    /// The remote push did not complete within the client timeout.
    #[error("remote push timed out after {0:?}")]
    Timeout(Duration),

    /// The remote push failed before a response was received.
    #[error("remote push failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The remote endpoint answered with a non-success status.
    #[error("remote endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// A destination that durably emits one log event.
///
/// Sinks hold no per-request state and must tolerate concurrent calls. Any fixed
/// attributes (such as a service name) belong to the sink and are merged into
/// every event it writes.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in diagnostics and metric labels.
    fn name(&self) -> &str;

    /// Write one event.
    async fn emit(&self, event: &LogEvent) -> Result<(), SinkError>;
}
