//! Request capture.
//!
//! # Responsibilities
//! - Drain the request body (and trailers) into owned bytes, up to a limit
//! - Snapshot method, URL, protocol, headers and connection metadata
//!
//! # Design Decisions
//! - The record is built only after the body has been fully read; a failed read
//!   never yields a partial record
//! - Header names are canonicalized (`x-test` → `X-Test`) and all values of a
//!   repeated header are kept in arrival order
//! - `Host` and `Transfer-Encoding` are promoted to their own fields
//! - The body is serialized as standard base64 so binary payloads survive JSON

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request, Uri, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Serialize, Serializer};

use crate::observability::Fields;

/// Canonical header name → every value received for it.
pub type HeaderValues = BTreeMap<String, Vec<String>>;

/// Failure to capture a request.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The body stream failed before it was fully read (reset, disconnect, I/O).
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] axum::BoxError),

    /// The body is larger than the configured limit.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Structured form of the request target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestUrl {
    scheme: Option<String>,
    host: Option<String>,
    path: String,
    raw_query: Option<String>,
}

impl RequestUrl {
    fn from_uri(uri: &Uri) -> Self {
        Self {
            scheme: uri.scheme_str().map(str::to_owned),
            host: uri.authority().map(|a| a.as_str().to_owned()),
            path: uri.path().to_owned(),
            raw_query: uri.query().map(str::to_owned),
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_query(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(scheme), Some(host)) = (&self.scheme, &self.host) {
            write!(f, "{}://{}", scheme, host)?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.raw_query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// Immutable snapshot of one inbound request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    method: String,
    url: RequestUrl,
    proto: &'static str,
    proto_major: u8,
    proto_minor: u8,
    header: HeaderValues,
    #[serde(serialize_with = "serialize_base64")]
    body: Bytes,
    content_length: i64,
    transfer_encoding: Vec<String>,
    host: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    trailer: HeaderValues,
    remote_addr: String,
    request_uri: String,
    pattern: String,
}

impl RequestRecord {
    /// Drain `request` and capture it.
    ///
    /// The connection itself stays with the server; only the body is consumed.
    pub async fn extract(request: Request<Body>, max_body_bytes: usize) -> Result<Self, ExtractError> {
        let (parts, body) = request.into_parts();

        let collected = Limited::new(body, max_body_bytes)
            .collect()
            .await
            .map_err(|err| {
                if err.is::<LengthLimitError>() {
                    ExtractError::BodyTooLarge { limit: max_body_bytes }
                } else {
                    ExtractError::BodyRead(err)
                }
            })?;
        let trailer = collected.trailers().map(header_values).unwrap_or_default();
        let body = collected.to_bytes();

        let (proto, proto_major, proto_minor) = protocol(parts.version);
        let transfer_encoding = transfer_encoding(&parts.headers);
        let content_length = content_length(&parts.headers, &transfer_encoding, body.len());

        let host = parts
            .headers
            .get(header::HOST)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_owned()))
            .unwrap_or_default();

        let mut header = header_values(&parts.headers);
        header.remove("Host");
        header.remove("Transfer-Encoding");

        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        let request_uri = if parts.version >= Version::HTTP_2 {
            parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| "/".to_owned())
        } else {
            parts.uri.to_string()
        };

        Ok(Self {
            method: parts.method.as_str().to_owned(),
            url: RequestUrl::from_uri(&parts.uri),
            proto,
            proto_major,
            proto_minor,
            header,
            body,
            content_length,
            transfer_encoding,
            host,
            trailer,
            remote_addr,
            request_uri,
            pattern: parts.uri.path().to_owned(),
        })
    }

    /// The record as the `request` field of a log event.
    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        let mut fields = Fields::new();
        fields.insert("request".to_owned(), serde_json::to_value(self)?);
        Ok(fields)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &RequestUrl {
        &self.url
    }

    pub fn proto(&self) -> &str {
        self.proto
    }

    pub fn proto_version(&self) -> (u8, u8) {
        (self.proto_major, self.proto_minor)
    }

    pub fn headers(&self) -> &HeaderValues {
        &self.header
    }

    /// All values of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.header.get(&canonical_name(name)).map(Vec::as_slice)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_length(&self) -> i64 {
        self.content_length
    }

    pub fn transfer_encoding(&self) -> &[String] {
        &self.transfer_encoding
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn trailer(&self) -> &HeaderValues {
        &self.trailer
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn serialize_base64<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(body))
}

fn protocol(version: Version) -> (&'static str, u8, u8) {
    match version {
        Version::HTTP_09 => ("HTTP/0.9", 0, 9),
        Version::HTTP_10 => ("HTTP/1.0", 1, 0),
        Version::HTTP_2 => ("HTTP/2.0", 2, 0),
        Version::HTTP_3 => ("HTTP/3.0", 3, 0),
        _ => ("HTTP/1.1", 1, 1),
    }
}

fn header_values(headers: &HeaderMap) -> HeaderValues {
    let mut values = HeaderValues::new();
    for (name, value) in headers {
        values
            .entry(canonical_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    values
}

fn transfer_encoding(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Declared length, `-1` when unknown.
fn content_length(headers: &HeaderMap, transfer_encoding: &[String], body_len: usize) -> i64 {
    if transfer_encoding.iter().any(|c| c.eq_ignore_ascii_case("chunked")) {
        return -1;
    }
    match headers.get(header::CONTENT_LENGTH) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .unwrap_or(-1),
        None if body_len == 0 => 0,
        None => -1,
    }
}

/// `x-forwarded-for` → `X-Forwarded-For`.
fn canonical_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}
