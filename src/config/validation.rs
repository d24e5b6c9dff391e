//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ttl > 0, stream ceiling > 0)
//! - Check the bind address parses before anything is started
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GateConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.content.root.as_os_str().is_empty() {
        errors.push(ValidationError::new("content.root", "must not be empty"));
    }

    if config.tokens.ttl_secs == 0 {
        errors.push(ValidationError::new("tokens.ttl_secs", "must be greater than zero"));
    }

    if config.tokens.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    if matches!(&config.tokens.secret, Some(s) if s.is_empty()) {
        errors.push(ValidationError::new("tokens.secret", "must not be empty when set"));
    }

    if config.streams.max_concurrent == 0 {
        errors.push(ValidationError::new(
            "streams.max_concurrent",
            "must be greater than zero",
        ));
    }

    if config.cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "must list at least one origin (use \"*\" to allow any)",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
