//! Fan-out logger: one call site, many independent sinks.

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use crate::config::RemoteConfig;
use crate::fields;
use crate::observability::event::{Fields, LogEvent, Severity};
use crate::observability::loki::{LokiClient, LokiSink};
use crate::observability::metrics;
use crate::observability::sink::Sink;
use crate::observability::stream::StreamSink;

/// Writes every event at or above `min_level` to each sink, in order.
///
/// A failing sink never stops the remaining sinks and never reaches the caller;
/// failures are reported on the process diagnostic log instead.
pub struct FanOutLogger {
    channel: &'static str,
    min_level: Severity,
    sinks: Vec<Arc<dyn Sink>>,
}

impl FanOutLogger {
    pub fn new(channel: &'static str, min_level: Severity, sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            channel,
            min_level,
            sinks,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    pub fn min_level(&self) -> Severity {
        self.min_level
    }

    pub fn sinks(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|sink| sink.name())
    }

    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.min_level
    }

    /// Log one event. The caller's file and line are recorded as its `source`.
    #[track_caller]
    pub fn log<'a>(
        &'a self,
        level: Severity,
        message: &'a str,
        fields: Fields,
    ) -> impl Future<Output = ()> + Send + 'a {
        let source = Location::caller();
        async move {
            if !self.enabled(level) {
                return;
            }

            let event = LogEvent::new(level, message, fields).with_source(source);
            for sink in &self.sinks {
                match sink.emit(&event).await {
                    Ok(()) => metrics::record_emitted(self.channel, sink.name()),
                    Err(e) => {
                        metrics::record_sink_error(self.channel, sink.name());
                        tracing::error!(
                            channel = self.channel,
                            sink = sink.name(),
                            error = %e,
                            "Failed to write log event"
                        );
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for FanOutLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutLogger")
            .field("channel", &self.channel)
            .field("min_level", &self.min_level)
            .field("sinks", &self.sinks().collect::<Vec<_>>())
            .finish()
    }
}

/// The two process-wide loggers, built once at start-up.
#[derive(Debug)]
pub struct Loggers {
    /// Request records: stdout JSON, optionally mirrored to Loki.
    pub info: FanOutLogger,
    /// Errors: stderr text, optionally mirrored to Loki.
    pub error: FanOutLogger,
}

impl Loggers {
    /// Build the standard pair for the given remote configuration.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let remote = LokiClient::from_config(config)?.map(Arc::new);
        if let Some(client) = &remote {
            tracing::info!(push_url = client.push_url(), "Remote log sink enabled");
        }
        Ok(Self::with_local(
            Arc::new(StreamSink::stdout()),
            Arc::new(StreamSink::stderr()),
            remote,
            config,
        ))
    }

    /// Build the pair around explicit local sinks. Remote sinks are appended only
    /// when a client is given.
    pub fn with_local(
        stdout: Arc<dyn Sink>,
        stderr: Arc<dyn Sink>,
        remote: Option<Arc<LokiClient>>,
        config: &RemoteConfig,
    ) -> Self {
        let mut info_sinks = vec![stdout];
        let mut error_sinks = vec![stderr];

        if let Some(client) = remote {
            let mut attrs = fields!("service_name" => config.service_name);
            for (key, value) in &config.labels {
                attrs.insert(key.clone(), value.clone().into());
            }
            info_sinks.push(Arc::new(LokiSink::new(client.clone()).with_attrs(attrs.clone())));
            error_sinks.push(Arc::new(LokiSink::new(client).with_attrs(attrs)));
        }

        Self {
            info: FanOutLogger::new("info", Severity::Info, info_sinks),
            error: FanOutLogger::new("error", Severity::Error, error_sinks),
        }
    }
}
