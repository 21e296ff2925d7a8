//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main.rs → logging::init (before the graph is built)
//! hook invocations, HTTP requests → metrics.rs (metrics facade)
//!     → Prometheus exporter, when the metrics module is enabled
//! ```

pub mod logging;
pub mod metrics;
