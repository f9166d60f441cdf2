//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handler
//!     → fanout.rs (level gate, ordered sinks)
//!         → stream.rs (stdout JSON / stderr text, one locked line each)
//!         → loki.rs (remote push, bounded by client timeout)
//!     sink failures → logging.rs (tracing on stderr) + metrics.rs
//! ```
//!
//! # Design Decisions
//! - Two loggers (info, error) are built once and shared read-only
//! - Sinks are trait objects so the handler never branches on remote logging
//! - Process diagnostics never share a stream with request records

pub mod event;
pub mod fanout;
pub mod logging;
pub mod loki;
pub mod metrics;
pub mod sink;
pub mod stream;

pub use event::{Fields, LogEvent, Severity};
pub use fanout::{FanOutLogger, Loggers};
pub use loki::{LokiClient, LokiSink};
pub use sink::{Sink, SinkError};
pub use stream::{Format, StreamSink};
