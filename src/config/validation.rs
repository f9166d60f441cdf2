//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: `&LoggerdConfig → Result<(), Vec<ValidationError>>`
//! - Runs before the config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::LoggerdConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("listener.max_body_bytes must be greater than 0")]
    MaxBodyBytes,

    #[error("remote.loki_url {url:?} is invalid: {reason}")]
    LokiUrl { url: String, reason: String },

    #[error("remote.timeout_ms must be greater than 0")]
    Timeout,

    #[error("remote.service_name must not be empty")]
    ServiceName,

    #[error("remote.labels key {name:?} is invalid: {reason}")]
    LokiLabel { name: String, reason: &'static str },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

pub fn validate_config(config: &LoggerdConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::MaxBodyBytes);
    }

    if let Some(url) = &config.remote.loki_url {
        if let Err(reason) = check_loki_url(url) {
            errors.push(ValidationError::LokiUrl {
                url: url.clone(),
                reason,
            });
        }
    }
    if config.remote.timeout_ms == 0 {
        errors.push(ValidationError::Timeout);
    }
    if config.remote.service_name.is_empty() {
        errors.push(ValidationError::ServiceName);
    }
    for name in config.remote.labels.keys() {
        if let Err(reason) = check_label_name(name) {
            errors.push(ValidationError::LokiLabel {
                name: name.clone(),
                reason,
            });
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_loki_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("query and fragment are not allowed".to_string());
    }
    Ok(())
}

/// Loki label names match `[a-zA-Z_][a-zA-Z0-9_]*`; `service_name` and
/// `level` are set by the sink itself.
fn check_label_name(name: &str) -> Result<(), &'static str> {
    if matches!(name, "service_name" | "level") {
        return Err("reserved label");
    }
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err("must match [a-zA-Z_][a-zA-Z0-9_]*")
    }
}
