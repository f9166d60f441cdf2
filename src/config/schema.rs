//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file. Every
//! section has defaults, so an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for loggerd.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggerdConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Remote log sink (Loki). Disabled unless `loki_url` is set.
    pub remote: RemoteConfig,

    /// Diagnostics and metrics settings.
    pub observability: ObservabilityConfig,
}

impl LoggerdConfig {
    /// Replace the port of `listener.bind_address`.
    ///
    /// Accepts `8080` or `:8080`.
    pub fn set_port(&mut self, port: &str) {
        let port = port.trim_start_matches(':');
        let host = match self.listener.bind_address.rsplit_once(':') {
            Some((host, _)) => host,
            None => self.listener.bind_address.as_str(),
        };
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        self.listener.bind_address = format!("{}:{}", host, port);
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body buffered into a record. Larger bodies fail extraction.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Remote sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Loki base URL such as `http://localhost:3100`.
    pub loki_url: Option<String>,

    /// Timeout for a single push, in milliseconds.
    pub timeout_ms: u64,

    /// Value of the `service_name` label on every pushed event.
    pub service_name: String,

    /// Extra static labels on every pushed event.
    pub labels: BTreeMap<String, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            loki_url: None,
            timeout_ms: 5_000,
            service_name: "loggerd".to_string(),
            labels: BTreeMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `tracing` filter directive for diagnostics, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Prometheus scrape address; metrics are not exported when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: crate::observability::logging::DEFAULT_FILTER.to_string(),
            metrics_address: None,
        }
    }
}
