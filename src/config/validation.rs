//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listen addresses and the transport protocol
//! - Validate value ranges (timeouts > 0, pool bounds ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of one section
//! - Runs before a section is handed to the module that asked for it

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ApiConfig, AppConfig, DatabaseConfig, HttpConfig, MetricsConfig};
use crate::net::ListenAddress;

/// A single semantic problem in one section.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{section}] {field}: {reason}")]
pub struct ValidationError {
    pub section: &'static str,
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(section: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            section,
            field,
            reason: reason.into(),
        }
    }
}

/// Upper bound for a single hook timeout, in seconds.
pub const MAX_HOOK_TIMEOUT_SECS: u64 = 3600;

pub fn validate_app(config: &AppConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_hook_timeout("start_timeout_secs", config.start_timeout_secs, &mut errors);
    check_hook_timeout("stop_timeout_secs", config.stop_timeout_secs, &mut errors);
    errors
}

fn check_hook_timeout(field: &'static str, secs: u64, errors: &mut Vec<ValidationError>) {
    if secs == 0 {
        errors.push(ValidationError::new("app", field, "must be greater than zero"));
    } else if secs > MAX_HOOK_TIMEOUT_SECS {
        errors.push(ValidationError::new(
            "app",
            field,
            format!("{secs} exceeds the maximum of {MAX_HOOK_TIMEOUT_SECS}"),
        ));
    }
}

pub fn validate_http(config: &HttpConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_protocol("http", &config.protocol, &mut errors);
    check_address("http", "host", &config.host, &mut errors);
    if config.timeout_secs == 0 {
        errors.push(ValidationError::new("http", "timeout_secs", "must be greater than zero"));
    }
    errors
}

pub fn validate_api(config: &ApiConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    check_protocol("api", &config.protocol, &mut errors);
    check_address("api", "host", &config.host, &mut errors);
    if config.rate_limit {
        if config.rate_limit_max == 0 {
            errors.push(ValidationError::new("api", "rate_limit_max", "must be greater than zero"));
        }
        if config.rate_limit_window_secs == 0 {
            errors.push(ValidationError::new("api", "rate_limit_window_secs", "must be greater than zero"));
        }
    }
    if config.body_limit_bytes == 0 {
        errors.push(ValidationError::new("api", "body_limit_bytes", "must be greater than zero"));
    }
    errors
}

pub fn validate_database(config: &DatabaseConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if config.host.trim().is_empty() {
        errors.push(ValidationError::new("database", "host", "must not be empty"));
    }
    if config.name.trim().is_empty() {
        errors.push(ValidationError::new("database", "name", "must not be empty"));
    }
    if config.max_connections == 0 {
        errors.push(ValidationError::new("database", "max_connections", "must be greater than zero"));
    }
    if config.min_connections > config.max_connections {
        errors.push(ValidationError::new(
            "database",
            "min_connections",
            format!("{} exceeds max_connections ({})", config.min_connections, config.max_connections),
        ));
    }
    if config.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("database", "connect_timeout_secs", "must be greater than zero"));
    }
    errors
}

pub fn validate_metrics(config: &MetricsConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if config.enabled && config.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("metrics", "address", "expected an ip:port socket address"));
    }
    errors
}

fn check_protocol(section: &'static str, protocol: &str, errors: &mut Vec<ValidationError>) {
    if !protocol.eq_ignore_ascii_case("tcp") {
        errors.push(ValidationError::new(
            section,
            "protocol",
            format!("unsupported protocol `{protocol}`, expected `tcp`"),
        ));
    }
}

fn check_address(section: &'static str, field: &'static str, address: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = ListenAddress::parse(address) {
        errors.push(ValidationError::new(section, field, e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "ronin".to_string(),
            password: "secret".to_string(),
            name: "ronin".to_string(),
            min_connections: 0,
            max_connections: 10,
            idle_timeout_secs: 600,
            connect_timeout_secs: 5,
            max_lifetime_secs: 1800,
        }
    }

    #[test]
    fn valid_http_section_passes() {
        let config = HttpConfig {
            service: "http".to_string(),
            protocol: "tcp".to_string(),
            host: ":8080".to_string(),
            timeout_secs: 30,
        };
        assert!(validate_http(&config).is_empty());
    }

    #[test]
    fn collects_every_http_problem() {
        let config = HttpConfig {
            service: "http".to_string(),
            protocol: "udp".to_string(),
            host: "localhost".to_string(),
            timeout_secs: 0,
        };
        let fields: Vec<_> = validate_http(&config).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, ["protocol", "host", "timeout_secs"]);
    }

    #[test]
    fn pool_bounds_must_be_ordered() {
        let mut config = database();
        config.min_connections = 20;
        let errors = validate_database(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "min_connections");
        assert_eq!(errors[0].to_string(), "[database] min_connections: 20 exceeds max_connections (10)");
    }

    #[test]
    fn hook_timeouts_must_be_positive_and_bounded() {
        let config = AppConfig {
            start_timeout_secs: 0,
            stop_timeout_secs: u64::MAX,
            ..AppConfig::default()
        };
        let errors = validate_app(&config);
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["start_timeout_secs", "stop_timeout_secs"]);
        assert!(validate_app(&AppConfig::default()).is_empty());
    }

    #[test]
    fn disabled_metrics_skip_address_check() {
        let config = MetricsConfig {
            enabled: false,
            address: "nonsense".to_string(),
        };
        assert!(validate_metrics(&config).is_empty());
    }
}
