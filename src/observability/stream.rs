//! Local stream sink.
//!
//! # Responsibilities
//! - Format an event as exactly one line (JSON object or `key=value` text)
//! - Write the whole line with a single locked `write_all`
//!
//! # Design Decisions
//! - The line is fully rendered before the lock is taken, so the critical
//!   section is only the write and flush
//! - The lock is a `std::sync::Mutex`; it is never held across an `.await`

use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::observability::event::{Fields, LogEvent};
use crate::observability::sink::{Sink, SinkError};

/// Line format of a [`StreamSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One JSON object per line.
    Json,
    /// `time=... level=... source=file:line msg="..." key=value` per line.
    Text,
}

/// Writes events to a byte stream, one line per event.
pub struct StreamSink {
    name: String,
    format: Format,
    attrs: Fields,
    out: Mutex<Box<dyn Write + Send>>,
}

impl StreamSink {
    pub fn new(name: impl Into<String>, format: Format, out: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            format,
            attrs: Fields::new(),
            out: Mutex::new(Box::new(out)),
        }
    }

    /// JSON lines on standard output.
    pub fn stdout() -> Self {
        Self::new("stdout", Format::Json, io::stdout())
    }

    /// Text lines on standard error.
    pub fn stderr() -> Self {
        Self::new("stderr", Format::Text, io::stderr())
    }

    /// Attach fixed attributes merged into every line.
    pub fn with_attrs(mut self, attrs: Fields) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Render an event as one newline-terminated line.
    pub fn render(&self, event: &LogEvent) -> Result<Vec<u8>, SinkError> {
        let mut line = match self.format {
            Format::Json => serde_json::to_vec(&event.to_json(&self.attrs, true))?,
            Format::Text => render_text(event, &self.attrs).into_bytes(),
        };
        line.push(b'\n');
        Ok(line)
    }
}

#[async_trait]
impl Sink for StreamSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        let line = self.render(event)?;

        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Poisoned(self.name.clone()))?;
        out.write_all(&line)
            .and_then(|()| out.flush())
            .map_err(|source| SinkError::Io {
                sink: self.name.clone(),
                source,
            })
    }
}

fn render_text(event: &LogEvent, attrs: &Fields) -> String {
    let mut line = format!("time={} level={} ", event.timestamp(), event.level());
    if let Some(source) = event.source() {
        line.push_str("source=");
        push_text_value(&mut line, &format!("{}:{}", source.file(), source.line()));
        line.push(' ');
    }
    line.push_str("msg=");
    push_text_value(&mut line, event.message());

    for (key, value) in attrs.iter().chain(event.fields().iter()) {
        line.push(' ');
        push_text_value(&mut line, key);
        line.push('=');
        match value {
            Value::String(s) => push_text_value(&mut line, s),
            other => push_text_value(&mut line, &other.to_string()),
        }
    }
    line
}

fn push_text_value(line: &mut String, value: &str) {
    if needs_quoting(value) {
        // A JSON string literal escapes quotes, backslashes and control characters.
        line.push_str(&Value::String(value.to_owned()).to_string());
    } else {
        line.push_str(value);
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '=')
}
