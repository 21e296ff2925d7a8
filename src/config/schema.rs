//! Configuration schema definitions.
//!
//! Each TOML section maps to one typed record. Records implement [`Section`]
//! so a module can resolve and validate the one it needs by type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;

/// A typed configuration record stored under one top-level TOML table.
pub trait Section: DeserializeOwned {
    /// Table name, e.g. `"http"` for `[http]`.
    const NAME: &'static str;

    /// Semantic checks run after deserialization. Returns every problem found.
    fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }
}

/// Deployment stage of the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Development,
    Staging,
    Production,
}

/// Application identity and lifecycle bounds (`[app]`, optional).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name used in logs.
    pub name: String,

    pub stage: Stage,

    /// Bound for each start hook, in seconds.
    pub start_timeout_secs: u64,

    /// Bound for each stop hook, in seconds.
    pub stop_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "ronin-codebase".to_string(),
            stage: Stage::Development,
            start_timeout_secs: 15,
            stop_timeout_secs: 15,
        }
    }
}

impl Section for AppConfig {
    const NAME: &'static str = "app";

    fn validate(&self) -> Vec<ValidationError> {
        crate::config::validation::validate_app(self)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration (`[log]`, optional).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`, `ronin_codebase=debug`).
    pub level: String,

    /// Output format. Defaults to JSON in production, pretty otherwise.
    pub format: Option<LogFormat>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

impl Section for LogConfig {
    const NAME: &'static str = "log";
}

/// Plain HTTP server (`[http]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Service label used in logs and metrics.
    #[serde(default = "default_http_service")]
    pub service: String,

    /// Transport protocol. Only `tcp` is supported.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Listen address as `host:port`. An empty host binds all interfaces.
    pub host: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Section for HttpConfig {
    const NAME: &'static str = "http";

    fn validate(&self) -> Vec<ValidationError> {
        crate::config::validation::validate_http(self)
    }
}

/// Framework HTTP server (`[api]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_service")]
    pub service: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Listen address as `host:port`.
    pub host: String,

    /// Enable per-client request limiting.
    #[serde(default)]
    pub rate_limit: bool,

    /// Requests allowed per client within one window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Window length in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,

    /// Maximum request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Section for ApiConfig {
    const NAME: &'static str = "api";

    fn validate(&self) -> Vec<ValidationError> {
        crate::config::validation::validate_api(self)
    }
}

/// Postgres connection pool (`[database]`).
#[derive(Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,

    /// Database name.
    pub name: String,

    #[serde(default)]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Close connections idle for longer than this, in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Give up acquiring a connection after this many seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Recycle connections older than this, in seconds.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .finish()
    }
}

impl Section for DatabaseConfig {
    const NAME: &'static str = "database";

    fn validate(&self) -> Vec<ValidationError> {
        crate::config::validation::validate_database(self)
    }
}

/// Prometheus exporter (`[metrics]`, optional).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Exporter bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Section for MetricsConfig {
    const NAME: &'static str = "metrics";

    fn validate(&self) -> Vec<ValidationError> {
        crate::config::validation::validate_metrics(self)
    }
}

fn default_http_service() -> String {
    "http".to_string()
}

fn default_api_service() -> String {
    "api".to_string()
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_rate_limit_max() -> u32 {
    20
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_body_limit() -> usize {
    4 * 1024 * 1024
}

fn default_max_connections() -> u32 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_lifetime() -> u64 {
    1800
}
