//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, apply RONIN__<SECTION>__<KEY> overrides)
//!     → Configuration (immutable, shared by clone)
//!     → module asks for a typed Section
//!         → serde deserializes the table
//!         → validation.rs (semantic checks)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Optional sections have defaults, listener and database sections do not
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, Configuration};
pub use schema::{ApiConfig, AppConfig, DatabaseConfig, HttpConfig, LogConfig, LogFormat, MetricsConfig, Section, Stage};
pub use validation::ValidationError;
