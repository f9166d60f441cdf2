//! Log events and severities shared by every sink.

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Structured key/value fields attached to an event or fixed on a sink.
pub type Fields = Map<String, Value>;

/// Log severity. Ordered so that `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Lower-case name, used for remote stream labels.
    pub fn as_label(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// One logical log event, handed by reference to each sink of a fan-out logger.
#[derive(Debug, Clone)]
pub struct LogEvent {
    time: DateTime<Utc>,
    level: Severity,
    message: String,
    fields: Fields,
    source: Option<&'static Location<'static>>,
}

impl LogEvent {
    /// Create an event stamped with the current time.
    pub fn new(level: Severity, message: impl Into<String>, fields: Fields) -> Self {
        Self::at(Utc::now(), level, message, fields)
    }

    /// Create an event with an explicit timestamp.
    pub fn at(time: DateTime<Utc>, level: Severity, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            time,
            level,
            message: message.into(),
            fields,
            source: None,
        }
    }

    /// Record the code location that produced the event.
    pub fn with_source(mut self, source: &'static Location<'static>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn source(&self) -> Option<&'static Location<'static>> {
        self.source
    }

    /// RFC 3339 timestamp with millisecond precision.
    pub fn timestamp(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Flatten the event into a single JSON object.
    ///
    /// Key order is `time`, `level`, `source` (when known), `msg`, then `attrs`,
    /// then the event's own fields. A field never overrides a leading key.
    pub fn to_json(&self, attrs: &Fields, with_time: bool) -> Value {
        let mut object = Map::with_capacity(4 + attrs.len() + self.fields.len());
        if with_time {
            object.insert("time".into(), Value::String(self.timestamp()));
        }
        object.insert("level".into(), Value::String(self.level.to_string()));
        if let Some(source) = self.source {
            object.insert(
                "source".into(),
                serde_json::json!({ "file": source.file(), "line": source.line() }),
            );
        }
        object.insert("msg".into(), Value::String(self.message.clone()));
        for (key, value) in attrs.iter().chain(self.fields.iter()) {
            if matches!(key.as_str(), "time" | "level" | "source" | "msg") {
                continue;
            }
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Build a [`Fields`] map from `key => value` pairs.
#[macro_export]
macro_rules! fields {
    () => { $crate::observability::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::observability::Fields::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )+
        map
    }};
}
