//! loggerd: an HTTP endpoint that records every request it receives.
//!
//! Each request is captured as a structured record and written as one JSON line
//! to stdout, optionally mirrored to Grafana Loki. Capture failures are written
//! to stderr (and Loki) and answered with 500.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::LoggerdConfig;
pub use http::{HttpServer, RequestRecord};
pub use lifecycle::Shutdown;
pub use observability::{FanOutLogger, Loggers, Severity, Sink, SinkError};
