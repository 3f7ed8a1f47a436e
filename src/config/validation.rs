//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, timeouts > 0)
//! - Check that enabled dependencies are addressable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RuntimeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, on load and on every reload

use std::net::SocketAddr;

use axum::http::Uri;
use thiserror::Error;

use crate::config::schema::RuntimeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.bind_host.trim().is_empty() {
        errors.push(ValidationError::new("http.bind_host", "must not be empty"));
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
    }
    if config.http.shutdown_grace_ms == 0 {
        errors.push(ValidationError::new("http.shutdown_grace_ms", "must be greater than 0"));
    }
    if config.http.stage_timeout_ms == 0 {
        errors.push(ValidationError::new("http.stage_timeout_ms", "must be greater than 0"));
    }

    for (name, worker) in &config.workers.entries {
        if worker.interval_ms == 0 {
            errors.push(ValidationError::new(
                format!("workers.{name}.interval_ms"),
                "must be greater than 0",
            ));
        }
    }

    if let Some(key) = &config.admin.api_key {
        if key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty when set"));
        }
    }

    if config.database.enabled {
        if config.database.url.trim().is_empty() {
            errors.push(ValidationError::new("database.url", "required when database is enabled"));
        }
        if config.database.max_connections == 0 {
            errors.push(ValidationError::new("database.max_connections", "must be greater than 0"));
        }
        if config.database.min_connections > config.database.max_connections {
            errors.push(ValidationError::new(
                "database.min_connections",
                "must not exceed max_connections",
            ));
        }
    }

    if config.search.enabled {
        match config.search.url.parse::<Uri>() {
            Ok(uri) if uri.scheme_str() == Some("http") && uri.authority().is_some() => {}
            Ok(_) => errors.push(ValidationError::new("search.url", "must be an absolute http:// URL")),
            Err(e) => errors.push(ValidationError::new("search.url", e.to_string())),
        }
        if !config.search.health_path.starts_with('/') {
            errors.push(ValidationError::new("search.health_path", "must start with '/'"));
        }
    }

    if !config.socket.path.starts_with('/') {
        errors.push(ValidationError::new("socket.path", "must start with '/'"));
    }
    if config.socket.broadcast_capacity == 0 {
        errors.push(ValidationError::new("socket.broadcast_capacity", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
