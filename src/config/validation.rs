//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, log levels and timeout ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Admission limits are not validated here; the controller normalizes them

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// Shortest request timeout accepted, in milliseconds.
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is not a socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("unknown log level: {0}")]
    InvalidLogLevel(String),

    #[error("request timeout must be at least {min} ms, got {actual} ms")]
    RequestTimeoutTooShort { min: u64, actual: u64 },

    #[error("metrics poll interval must be positive")]
    ZeroPollInterval,

    #[error("admin api key must not be empty")]
    EmptyApiKey,
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.timeouts.request_ms < MIN_REQUEST_TIMEOUT_MS {
        errors.push(ValidationError::RequestTimeoutTooShort {
            min: MIN_REQUEST_TIMEOUT_MS,
            actual: config.timeouts.request_ms,
        });
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
        if config.observability.metrics_poll_ms == 0 {
            errors.push(ValidationError::ZeroPollInterval);
        }
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
